use std::collections::HashSet;
use std::env;
use std::str::FromStr;

use crate::service::Operation;
use crate::units::Units;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl FromStr for Transport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => Err(anyhow::anyhow!(
                "TRANSPORT must be 'stdio' or 'http', got '{}'",
                other
            )),
        }
    }
}

/// Which operations consult and populate the response cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    cached: HashSet<Operation>,
}

impl CachePolicy {
    pub fn new(operations: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            cached: operations.into_iter().collect(),
        }
    }

    pub fn is_cached(&self, operation: Operation) -> bool {
        self.cached.contains(&operation)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new([Operation::CurrentWeather, Operation::Forecast])
    }
}

impl FromStr for CachePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let operations = s
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                name.parse::<Operation>()
                    .map_err(|e| anyhow::anyhow!("CACHED_OPERATIONS: {}", e))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(operations))
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub geo_url: String,
    pub default_units: Units,
    pub default_lang: String,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub cache_policy: CachePolicy,
    pub max_daily_calls: u64,
    pub server_name: String,
    pub log_level: String,
    pub transport: Transport,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            api_key: lookup("API_KEY")
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("API_KEY not set"))?,
            base_url: var("BASE_URL", "https://api.openweathermap.org/data/2.5")
                .trim_end_matches('/')
                .to_string(),
            geo_url: var("GEO_URL", "https://api.openweathermap.org/geo/1.0")
                .trim_end_matches('/')
                .to_string(),
            default_units: var("DEFAULT_UNITS", "metric")
                .parse()
                .map_err(|e| anyhow::anyhow!("DEFAULT_UNITS: {}", e))?,
            default_lang: var("DEFAULT_LANG", "en"),
            cache_ttl_secs: parse_number(&lookup, "CACHE_TTL", 600)?,
            cache_max_entries: parse_number(&lookup, "CACHE_MAX_ENTRIES", 1000)?,
            cache_policy: match lookup("CACHED_OPERATIONS") {
                Some(list) => list.parse()?,
                None => CachePolicy::default(),
            },
            max_daily_calls: parse_number(&lookup, "MAX_DAILY_CALLS", 1000)?,
            server_name: var("SERVER_NAME", "OpenWeatherMap Query Server"),
            log_level: var("LOG_LEVEL", "INFO"),
            transport: var("TRANSPORT", "stdio").parse()?,
            port: parse_number(&lookup, "PORT", 8000)?,
            request_timeout_secs: parse_number(&lookup, "REQUEST_TIMEOUT", 30)?,
        })
    }
}

fn parse_number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
