use chrono::Local;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::accounting::{CallAccountant, UsageStatus};
use crate::cache::{CacheStats, ExpiringCache};
use crate::clock::Clock;
use crate::config::Config;
use crate::location::{classify, resolve_to_coordinates};
use crate::provider::normalize;
use crate::provider::{OpenWeatherClient, OpenWeatherError};
use crate::units::{self, Units};

/// Upstream forecasts come in 3-hour slots.
pub const FORECAST_SLOTS_PER_DAY: u32 = 8;
pub const MAX_FORECAST_ENTRIES: u32 = 40;
pub const MAX_GEOCODE_RESULTS: u32 = 5;

/// Number of forecast slots requested for `days` days.
pub fn forecast_count(days: u32) -> u32 {
    days.max(1)
        .saturating_mul(FORECAST_SLOTS_PER_DAY)
        .min(MAX_FORECAST_ENTRIES)
}

pub fn geocode_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_GEOCODE_RESULTS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CurrentWeather,
    Forecast,
    SearchLocation,
    WeatherByZip,
    AirQuality,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::CurrentWeather => "current_weather",
            Operation::Forecast => "forecast",
            Operation::SearchLocation => "search_location",
            Operation::WeatherByZip => "weather_by_zip",
            Operation::AirQuality => "air_quality",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current_weather" => Ok(Operation::CurrentWeather),
            "forecast" => Ok(Operation::Forecast),
            "search_location" => Ok(Operation::SearchLocation),
            "weather_by_zip" => Ok(Operation::WeatherByZip),
            "air_quality" => Ok(Operation::AirQuality),
            other => Err(format!("unknown operation '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Api,
}

/// Outcome of a query operation. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Success { source: Source, payload: Value },
    Failure { message: String },
}

impl QueryResult {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryResult::Success { .. })
    }
}

// Success flattens the payload next to `source`; failure is `{"error": ...}`.
impl Serialize for QueryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QueryResult::Success { source, payload } => {
                let fields = payload.as_object();
                let mut map = serializer.serialize_map(Some(1 + fields.map_or(1, |f| f.len())))?;
                map.serialize_entry("source", source)?;
                match fields {
                    Some(fields) => {
                        for (key, value) in fields {
                            map.serialize_entry(key, value)?;
                        }
                    }
                    None => map.serialize_entry("data", payload)?,
                }
                map.end()
            }
            QueryResult::Failure { message } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", message)?;
                map.end()
            }
        }
    }
}

#[derive(Error, Debug)]
enum QueryError {
    #[error("Location '{0}' not found")]
    LocationNotFound(String),
    #[error("ZIP code '{zip}' not found in country '{country}'")]
    ZipNotFound { zip: String, country: String },
    #[error("Could not find coordinates for '{0}'")]
    Unresolved(String),
    #[error("No air quality data available")]
    NoAirQualityData,
    #[error(transparent)]
    Upstream(#[from] OpenWeatherError),
    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

fn encode<T: Serialize>(report: T) -> Result<Value, QueryError> {
    Ok(serde_json::to_value(report)?)
}

impl QueryError {
    fn for_location(err: OpenWeatherError, location: &str) -> Self {
        match err {
            OpenWeatherError::NotFound => QueryError::LocationNotFound(location.to_string()),
            other => QueryError::Upstream(other),
        }
    }
}

/// The query operations, sharing one cache, one call accountant and one
/// HTTP client.
///
/// Concurrent misses on the same key are not coalesced: each goes upstream
/// and the last response written wins. Nothing is retried.
pub struct WeatherService {
    config: Arc<Config>,
    client: OpenWeatherClient,
    cache: Arc<ExpiringCache<Value>>,
    accountant: Arc<CallAccountant>,
    clock: Arc<dyn Clock>,
}

impl WeatherService {
    pub fn new(
        config: Arc<Config>,
        client: OpenWeatherClient,
        cache: Arc<ExpiringCache<Value>>,
        accountant: Arc<CallAccountant>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            client,
            cache,
            accountant,
            clock,
        }
    }

    /// Wires a cache, an accountant and a client from `config`.
    pub fn from_config(config: Config, clock: Arc<dyn Clock>) -> Result<Self, OpenWeatherError> {
        let cache = Arc::new(ExpiringCache::new(
            config.cache_ttl_secs,
            config.cache_max_entries,
            clock.clone(),
        ));
        let accountant = Arc::new(CallAccountant::new(config.max_daily_calls, clock.clone()));
        let client = OpenWeatherClient::new(&config, accountant.clone())?;

        Ok(Self::new(Arc::new(config), client, cache, accountant, clock))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn current_weather(
        &self,
        location: &str,
        units: Units,
        include_details: bool,
    ) -> QueryResult {
        let key = format!("current:{}:{}:{}", location, units, include_details);

        self.run(Operation::CurrentWeather, key, async {
            let raw = self
                .client
                .current_weather(&classify(location), units)
                .await
                .map_err(|e| QueryError::for_location(e, location))?;
            let report = normalize::current_weather(&raw, units, include_details, &Local)?;
            encode(report)
        })
        .await
    }

    pub async fn forecast(&self, location: &str, days: u32, units: Units) -> QueryResult {
        let key = format!("forecast:{}:{}:{}", location, days, units);

        self.run(Operation::Forecast, key, async {
            let raw = self
                .client
                .forecast3h(&classify(location), forecast_count(days), units)
                .await
                .map_err(|e| QueryError::for_location(e, location))?;
            let report = normalize::forecast(&raw, units, &Local)?;
            encode(report)
        })
        .await
    }

    pub async fn search_location(&self, query: &str, limit: u32) -> QueryResult {
        let limit = geocode_limit(limit);
        let key = format!("search:{}:{}", query, limit);

        self.run(Operation::SearchLocation, key, async {
            let raw = self.client.geocode_direct(query, limit).await?;
            encode(normalize::search_results(query, &raw))
        })
        .await
    }

    pub async fn weather_by_zip(&self, zip_code: &str, country_code: &str, units: Units) -> QueryResult {
        let key = format!("zip:{}:{}:{}", zip_code, country_code, units);

        self.run(Operation::WeatherByZip, key, async {
            let raw = self
                .client
                .current_weather_by_zip(zip_code, country_code, units)
                .await
                .map_err(|e| match e {
                    OpenWeatherError::NotFound => QueryError::ZipNotFound {
                        zip: zip_code.to_string(),
                        country: country_code.to_string(),
                    },
                    other => QueryError::Upstream(other),
                })?;
            let report = normalize::zip_weather(&raw, zip_code, country_code, units)?;
            encode(report)
        })
        .await
    }

    /// Air quality needs coordinates; place names are geocoded first.
    pub async fn air_quality(&self, location: &str) -> QueryResult {
        let key = format!("air_quality:{}", location);

        self.run(Operation::AirQuality, key, async {
            let coords = resolve_to_coordinates(classify(location), &self.client)
                .await
                .map_err(|err| {
                    tracing::warn!("Coordinate lookup for '{}' failed: {}", location, err);
                    QueryError::Unresolved(location.to_string())
                })?;

            let raw = self
                .client
                .air_pollution(coords)
                .await
                .map_err(|e| QueryError::for_location(e, location))?;
            let report = normalize::air_quality(&raw, coords, &Local)?
                .ok_or(QueryError::NoAirQualityData)?;
            encode(report)
        })
        .await
    }

    pub fn usage(&self) -> UsageStatus {
        self.accountant.status()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) -> usize {
        let removed = self.cache.clear();
        tracing::info!("Cleared {} cache entries", removed);
        removed
    }

    pub fn api_status(&self) -> Value {
        let usage = self.usage();
        json!({
            "status": "operational",
            "api_key_configured": !self.config.api_key.is_empty(),
            "base_url": self.config.base_url,
            "daily_limit": usage.daily_limit,
            "calls_today": usage.count,
            "calls_remaining": usage.remaining,
            "cache_stats": self.cache_stats(),
            "timestamp": self.clock.now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        })
    }

    pub fn units_info(&self) -> Value {
        units::units_info(self.config.default_units)
    }

    async fn run<F>(&self, operation: Operation, key: String, fetch: F) -> QueryResult
    where
        F: Future<Output = Result<Value, QueryError>>,
    {
        let cacheable = self.config.cache_policy.is_cached(operation);

        if cacheable {
            if let Some(payload) = self.cache.get(&key) {
                tracing::info!("Returning cached {} for {}", operation, key);
                return QueryResult::Success {
                    source: Source::Cache,
                    payload,
                };
            }
        }

        match fetch.await {
            Ok(payload) => {
                if cacheable {
                    self.cache.set(key, payload.clone());
                }
                QueryResult::Success {
                    source: Source::Api,
                    payload,
                }
            }
            Err(err) => {
                tracing::error!("{} failed: {}", operation, err);
                QueryResult::Failure {
                    message: err.to_string(),
                }
            }
        }
    }
}
