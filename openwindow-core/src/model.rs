use serde::{Deserialize, Serialize};
use std::fmt;

/// A position reported by the location collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// Query key for the weather service, as returned by reverse geocoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityRef {
    pub locality: String,
    pub sub_locality: String,
}

impl LocalityRef {
    pub fn new(locality: impl Into<String>, sub_locality: impl Into<String>) -> Self {
        Self { locality: locality.into(), sub_locality: sub_locality.into() }
    }
}

impl fmt::Display for LocalityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.locality, self.sub_locality)
    }
}

/// One hourly entry as sent by the weather service.
///
/// Numeric fields arrive as strings and are only parsed during aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyReading {
    /// Relative humidity in percent.
    pub humidity: String,
    /// Temperature in degrees Celsius.
    pub temp: String,
    /// Condition description, e.g. "晴".
    pub text: String,
    #[serde(rename = "fxTime", default, skip_serializing_if = "Option::is_none")]
    pub forecast_time: Option<String>,
}

impl HourlyReading {
    pub fn new(
        humidity: impl Into<String>,
        temp: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            humidity: humidity.into(),
            temp: temp.into(),
            text: text.into(),
            forecast_time: None,
        }
    }
}

/// Response document of the weather service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    pub hourly: Vec<HourlyReading>,
}

impl HourlySeries {
    pub fn new(hourly: Vec<HourlyReading>) -> Self {
        Self { hourly }
    }

    pub fn len(&self) -> usize {
        self.hourly.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hourly.is_empty()
    }
}

/// Representative values of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReading {
    pub average_humidity: f64,
    pub average_temperature: f64,
    /// Condition text of the first hour ("current" condition).
    pub condition: String,
}

impl AggregateReading {
    /// Status line text shown by the presentation surface.
    pub fn label(&self) -> String {
        format!("humidity: {:.1}%", self.average_humidity)
    }
}

/// Integer comfort score; 0..=100 unless component clamping is disabled and
/// the inputs are extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComfortScore(i32);

impl ComfortScore {
    pub const MIN: i32 = 0;
    pub const MAX: i32 = 100;

    pub fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn is_within_bounds(self) -> bool {
        (Self::MIN..=Self::MAX).contains(&self.0)
    }
}

impl fmt::Display for ComfortScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State threaded through one pipeline pass.
#[derive(Debug, Clone)]
pub struct PassContext {
    pub coordinate: Coordinate,
    pub locality: Option<LocalityRef>,
}

impl PassContext {
    pub fn new(coordinate: Coordinate) -> Self {
        Self { coordinate, locality: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_uses_one_decimal() {
        let reading = AggregateReading {
            average_humidity: 50.0,
            average_temperature: 30.0,
            condition: "晴".into(),
        };
        assert_eq!(reading.label(), "humidity: 50.0%");

        let reading = AggregateReading { average_humidity: 66.666, ..reading };
        assert_eq!(reading.label(), "humidity: 66.7%");
    }

    #[test]
    fn hourly_reading_ignores_unknown_fields() {
        let json = r#"{
            "hourly": [
                {"fxTime": "2021-02-16T15:00+08:00", "temp": "2", "icon": "100",
                 "text": "晴", "humidity": "30", "windDir": "北风"}
            ]
        }"#;
        let series: HourlySeries = serde_json::from_str(json).expect("valid document");
        assert_eq!(series.len(), 1);
        assert_eq!(series.hourly[0].temp, "2");
        assert_eq!(series.hourly[0].forecast_time.as_deref(), Some("2021-02-16T15:00+08:00"));
    }

    #[test]
    fn score_bounds() {
        assert!(ComfortScore::new(100).is_within_bounds());
        assert!(ComfortScore::new(0).is_within_bounds());
        assert!(!ComfortScore::new(-3).is_within_bounds());
    }
}
