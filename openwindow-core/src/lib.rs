//! Core library for the `openwindow` comfort score.
//!
//! This crate defines:
//! - Configuration of the geocoding and weather services
//! - Locality resolution and the hourly weather client
//! - Aggregation and the window comfort model
//! - The single-flight pipeline tying them together
//!
//! It is used by `openwindow-cli`, but any presentation surface can drive a
//! [`Pipeline`] through the [`Presenter`] trait.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod locality;
pub mod model;
pub mod pipeline;
pub mod score;

pub use aggregate::aggregate;
pub use client::{HttpWeatherClient, WeatherSource};
pub use config::{Config, GeocoderConfig, ScoringConfig, WeatherConfig};
pub use error::{ErrorKind, FetchFailure, PipelineError};
pub use locality::{LocalityResolver, NominatimResolver};
pub use model::{
    AggregateReading, ComfortScore, Coordinate, HourlyReading, HourlySeries, LocalityRef,
    PassContext,
};
pub use pipeline::{
    Flight, PassOutcome, Pipeline, PipelineState, Presenter, UpdatePolicy, run_updates,
};
pub use score::{ConditionClass, ScoreBreakdown, ScoreCalculator};
