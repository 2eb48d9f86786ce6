//! Reverse geocoding: coordinates to a locality / sub-locality pair.
//!
//! Uses Nominatim (OpenStreetMap) by default; any compatible `/reverse`
//! endpoint works.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url, header};
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};
use tracing::debug;

use crate::{
    config::GeocoderConfig,
    error::PipelineError,
    model::{Coordinate, LocalityRef},
};

#[async_trait]
pub trait LocalityResolver: Send + Sync + Debug {
    /// Returns [`PipelineError::NotFound`] for every failure, including
    /// transport errors of the underlying service.
    async fn resolve(&self, coordinate: Coordinate) -> Result<LocalityRef, PipelineError>;
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,

    suburb: Option<String>,
    city_district: Option<String>,
    district: Option<String>,
    borough: Option<String>,
    quarter: Option<String>,
    neighbourhood: Option<String>,
}

impl NominatimAddress {
    fn into_locality(self) -> Option<LocalityRef> {
        let locality = first_present([
            self.city,
            self.town,
            self.village,
            self.municipality,
            self.county,
        ])?;
        let sub_locality = first_present([
            self.suburb,
            self.city_district,
            self.district,
            self.borough,
            self.quarter,
            self.neighbourhood,
        ])?;
        Some(LocalityRef { locality, sub_locality })
    }
}

fn first_present<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates.into_iter().flatten().find(|s| !s.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct NominatimResolver {
    endpoint: Url,
    accept_language: Option<String>,
    http: Client,
}

impl NominatimResolver {
    pub fn new(
        base_url: &str,
        user_agent: &str,
        accept_language: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build geocoding HTTP client")?;

        let mut endpoint = Url::parse(base_url)
            .with_context(|| format!("Invalid geocoder URL: {base_url}"))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Geocoder URL cannot carry path segments: {base_url}"))?
            .pop_if_empty()
            .push("reverse");

        Ok(Self { endpoint, accept_language, http })
    }

    pub fn from_config(config: &GeocoderConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.base_url,
            &config.user_agent,
            config.accept_language.clone(),
            config.timeout(),
        )
    }
}

#[async_trait]
impl LocalityResolver for NominatimResolver {
    async fn resolve(&self, coordinate: Coordinate) -> Result<LocalityRef, PipelineError> {
        let mut request = self.http.get(self.endpoint.clone()).query(&[
            ("format", "jsonv2".to_string()),
            ("lat", coordinate.latitude.to_string()),
            ("lon", coordinate.longitude.to_string()),
            ("addressdetails", "1".to_string()),
        ]);
        if let Some(lang) = &self.accept_language {
            request = request.header(header::ACCEPT_LANGUAGE, lang);
        }

        let res = request
            .send()
            .await
            .map_err(|e| PipelineError::NotFound(format!("reverse geocode request failed: {e}")))?;

        if !res.status().is_success() {
            return Err(PipelineError::NotFound(format!(
                "reverse geocode returned status {}",
                res.status()
            )));
        }

        let body: NominatimResponse = res
            .json()
            .await
            .map_err(|e| PipelineError::NotFound(format!("reverse geocode parse error: {e}")))?;

        if let Some(reason) = body.error {
            return Err(PipelineError::NotFound(reason));
        }

        let locality = body
            .address
            .and_then(NominatimAddress::into_locality)
            .ok_or_else(|| PipelineError::NotFound(format!("no placemark at {coordinate}")))?;

        debug!(%coordinate, %locality, "reverse geocoded");
        Ok(locality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(server: &MockServer) -> NominatimResolver {
        NominatimResolver::new(
            &server.uri(),
            "openwindow-tests",
            Some("zh-CN".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn city_and_suburb_are_preferred() {
        let addr = NominatimAddress {
            city: Some("北京市".into()),
            county: Some("ignored".into()),
            suburb: Some("朝阳区".into()),
            neighbourhood: Some("ignored".into()),
            ..Default::default()
        };
        assert_eq!(addr.into_locality(), Some(LocalityRef::new("北京市", "朝阳区")));
    }

    #[test]
    fn falls_back_through_place_ranks() {
        let addr = NominatimAddress {
            village: Some("Hallstatt".into()),
            quarter: Some(" ".into()),
            neighbourhood: Some("Markt".into()),
            ..Default::default()
        };
        assert_eq!(addr.into_locality(), Some(LocalityRef::new("Hallstatt", "Markt")));
    }

    #[test]
    fn both_parts_are_required() {
        let addr = NominatimAddress { city: Some("Berlin".into()), ..Default::default() };
        assert_eq!(addr.into_locality(), None);
    }

    #[tokio::test]
    async fn resolve_reads_first_placemark() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("lat", "39.9219"))
            .and(query_param("lon", "116.4436"))
            .and(query_param("format", "jsonv2"))
            .and(header_eq("accept-language", "zh-CN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "朝阳区, 北京市, 中国",
                "address": {
                    "suburb": "朝阳区",
                    "city": "北京市",
                    "country": "中国"
                }
            })))
            .mount(&server)
            .await;

        let locality = resolver(&server)
            .resolve(Coordinate::new(39.9219, 116.4436))
            .await
            .unwrap();

        assert_eq!(locality, LocalityRef::new("北京市", "朝阳区"));
    }

    #[tokio::test]
    async fn unable_to_geocode_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "Unable to geocode" })),
            )
            .mount(&server)
            .await;

        let err = resolver(&server).resolve(Coordinate::new(0.0, -140.0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("Unable to geocode"));
    }

    #[tokio::test]
    async fn service_failure_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = resolver(&server).resolve(Coordinate::new(1.0, 2.0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn missing_sub_locality_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": { "town": "Zermatt", "country": "Schweiz" }
            })))
            .mount(&server)
            .await;

        let err = resolver(&server).resolve(Coordinate::new(46.02, 7.75)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
