use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::{fmt::Debug, time::Duration};
use tracing::debug;

use crate::{
    config::WeatherConfig,
    error::{FetchFailure, PipelineError, truncate_body},
    model::{HourlySeries, LocalityRef},
};

/// Source of hourly weather data for a locality.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    /// An empty series is returned as-is; rejecting it is the aggregator's job.
    async fn fetch(&self, locality: &LocalityRef) -> Result<HourlySeries, PipelineError>;
}

/// Fetches `GET {base_url}/{locality}/{sub_locality}`.
#[derive(Debug, Clone)]
pub struct HttpWeatherClient {
    base_url: Url,
    http: Client,
}

impl HttpWeatherClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build weather HTTP client")?;
        Self::with_client(base_url, http)
    }

    pub fn from_config(config: &WeatherConfig) -> anyhow::Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    /// Use a preconfigured reqwest client (timeouts, proxies, ...).
    pub fn with_client(base_url: &str, http: Client) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid weather service URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Weather service URL cannot carry path segments: {base_url}"));
        }
        Ok(Self { base_url, http })
    }

    /// Request URL for a locality; each identifier becomes one escaped segment.
    pub fn url_for(&self, locality: &LocalityRef) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&locality.locality).push(&locality.sub_locality);
        }
        url
    }
}

#[async_trait]
impl WeatherSource for HttpWeatherClient {
    async fn fetch(&self, locality: &LocalityRef) -> Result<HourlySeries, PipelineError> {
        let url = self.url_for(locality);
        debug!(%url, "requesting hourly weather");

        let res = self.http.get(url).send().await.map_err(FetchFailure::Transport)?;

        let status = res.status();
        let body = res.text().await.map_err(FetchFailure::Transport)?;

        if !status.is_success() {
            return Err(FetchFailure::Status { status, body: truncate_body(&body) }.into());
        }

        let series: HourlySeries = serde_json::from_str(&body)?;
        debug!(readings = series.len(), "decoded hourly weather");

        Ok(series)
    }
}
