use crate::{
    error::PipelineError,
    model::{AggregateReading, HourlySeries},
};

/// Reduce an hourly series to averaged humidity/temperature and the first
/// hour's condition text.
pub fn aggregate(series: &HourlySeries) -> Result<AggregateReading, PipelineError> {
    let first = series.hourly.first().ok_or(PipelineError::EmptySeries)?;

    let mut humidity = RunningMean::default();
    let mut temperature = RunningMean::default();

    for (index, reading) in series.hourly.iter().enumerate() {
        humidity.push(parse_field(index, "humidity", &reading.humidity)?);
        temperature.push(parse_field(index, "temp", &reading.temp)?);
    }

    Ok(AggregateReading {
        average_humidity: humidity.value(),
        average_temperature: temperature.value(),
        condition: first.text.clone(),
    })
}

fn parse_field(index: usize, field: &'static str, raw: &str) -> Result<f64, PipelineError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(PipelineError::MalformedReading { index, field, value: raw.to_string() }),
    }
}

// Incremental mean: a constant series yields exactly that constant.
#[derive(Debug, Default)]
struct RunningMean {
    mean: f64,
    count: u32,
}

impl RunningMean {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / f64::from(self.count);
    }

    fn value(&self) -> f64 {
        self.mean
    }
}
