use super::types::*;
use crate::accounting::CallAccountant;
use crate::config::Config;
use crate::location::{Coordinates, Geocoder, LocationSpec};
use crate::units::Units;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenWeatherError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("Not found")]
    NotFound,
    #[error("API error: {status}")]
    ApiError { status: u16 },
    #[error("Malformed upstream payload: {0}")]
    MalformedPayload(String),
}

/// Thin client over the OpenWeatherMap REST endpoints.
///
/// One attempt per call, no retries. Every attempt is recorded with the
/// shared [`CallAccountant`] before the request goes out.
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
    geo_url: String,
    lang: String,
    accountant: Arc<CallAccountant>,
}

impl OpenWeatherClient {
    pub fn new(config: &Config, accountant: Arc<CallAccountant>) -> Result<Self, OpenWeatherError> {
        let client = Client::builder()
            .user_agent(concat!("weather-query-server/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            geo_url: config.geo_url.clone(),
            lang: config.default_lang.clone(),
            accountant,
        })
    }

    pub async fn current_weather(
        &self,
        location: &LocationSpec,
        units: Units,
    ) -> Result<CurrentWeatherResponse, OpenWeatherError> {
        let mut params = location.query_params();
        params.push(("units", units.to_string()));
        params.push(("lang", self.lang.clone()));

        let url = format!("{}/weather", self.base_url);
        self.fetch_json(&url, &params).await
    }

    pub async fn current_weather_by_zip(
        &self,
        zip_code: &str,
        country_code: &str,
        units: Units,
    ) -> Result<CurrentWeatherResponse, OpenWeatherError> {
        let params = [
            ("zip", format!("{},{}", zip_code, country_code)),
            ("units", units.to_string()),
        ];

        let url = format!("{}/weather", self.base_url);
        self.fetch_json(&url, &params).await
    }

    pub async fn forecast3h(
        &self,
        location: &LocationSpec,
        count: u32,
        units: Units,
    ) -> Result<Forecast3hResponse, OpenWeatherError> {
        let mut params = location.query_params();
        params.push(("units", units.to_string()));
        params.push(("cnt", count.to_string()));
        params.push(("lang", self.lang.clone()));

        let url = format!("{}/forecast", self.base_url);
        self.fetch_json(&url, &params).await
    }

    pub async fn geocode_direct(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<GeocodeMatch>, OpenWeatherError> {
        let params = [("q", query.to_string()), ("limit", limit.to_string())];

        let url = format!("{}/direct", self.geo_url);
        self.fetch_json(&url, &params).await
    }

    pub async fn air_pollution(
        &self,
        coords: Coordinates,
    ) -> Result<AirPollutionResponse, OpenWeatherError> {
        let params = [("lat", coords.lat.to_string()), ("lon", coords.lon.to_string())];

        let url = format!("{}/air_pollution", self.base_url);
        self.fetch_json(&url, &params).await
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, OpenWeatherError> {
        self.accountant.track();
        tracing::debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("appid", &self.api_key)])
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let json: Value = response.json().await?;
                Ok(serde_json::from_value(json)?)
            }
            reqwest::StatusCode::NOT_FOUND => Err(OpenWeatherError::NotFound),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::debug!("OpenWeather returned HTTP {}: {}", status, body);
                Err(OpenWeatherError::ApiError {
                    status: status.as_u16(),
                })
            }
        }
    }
}

impl Geocoder for OpenWeatherClient {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<GeocodeMatch>, OpenWeatherError> {
        self.geocode_direct(query, limit).await
    }
}
