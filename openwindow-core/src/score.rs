//! Window comfort model.
//!
//! Humidity is best at 30 %, temperature at 29 °C; every unit of deviation
//! costs one point. The condition contributes a fixed bucket value.

use crate::model::{AggregateReading, ComfortScore};

pub const OPTIMAL_HUMIDITY: f64 = 30.0;
pub const OPTIMAL_TEMPERATURE: f64 = 29.0;

/// Bucket of a condition description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionClass {
    Clear,
    Cloudy,
    Precipitation,
    Other,
}

impl ConditionClass {
    /// Exact match on the service vocabulary ("晴", "阴", "多云", "雨", "雪") and
    /// their English names. Anything else, including compounds such as "小雨",
    /// lands in [`ConditionClass::Other`].
    pub fn classify(text: &str) -> Self {
        let text = text.trim();
        match text {
            "晴" => return Self::Clear,
            "阴" | "多云" => return Self::Cloudy,
            "雨" | "雪" => return Self::Precipitation,
            _ => {}
        }

        match text.to_ascii_lowercase().as_str() {
            "clear" | "sunny" => Self::Clear,
            "overcast" | "cloudy" => Self::Cloudy,
            "rain" | "snow" => Self::Precipitation,
            _ => Self::Other,
        }
    }

    pub fn score(self) -> i32 {
        match self {
            Self::Clear => 100,
            Self::Cloudy => 80,
            Self::Precipitation => 50,
            Self::Other => 70,
        }
    }
}

/// Individual components of a score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub humidity: f64,
    pub temperature: f64,
    pub condition: i32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> ComfortScore {
        let sum = self.humidity + self.temperature + f64::from(self.condition);
        ComfortScore::new((sum / 3.0).floor() as i32)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreCalculator {
    clamp_components: bool,
}

impl ScoreCalculator {
    /// Unclamped: extreme inputs can push the score below zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamp humidity and temperature components to 0..=100 before averaging.
    pub fn clamped() -> Self {
        Self { clamp_components: true }
    }

    pub fn with_clamping(clamp_components: bool) -> Self {
        Self { clamp_components }
    }

    pub fn breakdown(&self, reading: &AggregateReading) -> ScoreBreakdown {
        let mut humidity = 100.0 - (reading.average_humidity - OPTIMAL_HUMIDITY).abs();
        let mut temperature = 100.0 - (reading.average_temperature - OPTIMAL_TEMPERATURE).abs();

        if self.clamp_components {
            humidity = humidity.clamp(0.0, 100.0);
            temperature = temperature.clamp(0.0, 100.0);
        }

        ScoreBreakdown {
            humidity,
            temperature,
            condition: ConditionClass::classify(&reading.condition).score(),
        }
    }

    pub fn score(&self, reading: &AggregateReading) -> ComfortScore {
        self.breakdown(reading).total()
    }
}
