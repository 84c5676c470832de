use serde::Serialize;
use std::future::Future;
use thiserror::Error;

use crate::provider::openweather::OpenWeatherError;
use crate::provider::types::GeocodeMatch;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let valid = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }
}

/// A free-form location string, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSpec {
    Coordinates(Coordinates),
    PlaceName(String),
}

impl LocationSpec {
    /// Upstream query parameters selecting this location.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        match self {
            LocationSpec::Coordinates(coords) => vec![
                ("lat", coords.lat.to_string()),
                ("lon", coords.lon.to_string()),
            ],
            LocationSpec::PlaceName(name) => vec![("q", name.clone())],
        }
    }
}

/// Reads `raw` as a `"lat,lon"` pair when both halves are in-range numbers,
/// and as a place name otherwise.
pub fn classify(raw: &str) -> LocationSpec {
    raw.split_once(',')
        .and_then(|(lat, lon)| {
            let lat = parse_degrees(lat)?;
            let lon = parse_degrees(lon)?;
            Coordinates::new(lat, lon)
        })
        .map(LocationSpec::Coordinates)
        .unwrap_or_else(|| LocationSpec::PlaceName(raw.to_string()))
}

// f64::from_str also accepts "inf", "NaN" and exponents; only plain
// signed decimals count as coordinates.
fn parse_degrees(part: &str) -> Option<f64> {
    let part = part.trim();
    let digits = part.strip_prefix(['-', '+']).unwrap_or(part);
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    let plain = !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit());
    if !plain {
        return None;
    }
    part.parse().ok()
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No location found for '{0}'")]
    NotFound(String),
    #[error(transparent)]
    Lookup(#[from] OpenWeatherError),
}

/// Place-name search backing coordinate resolution.
pub trait Geocoder {
    fn search(
        &self,
        query: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<GeocodeMatch>, OpenWeatherError>> + Send;
}

/// Returns coordinates for `spec`, searching for place names (first match wins).
pub async fn resolve_to_coordinates<G: Geocoder + Sync>(
    spec: LocationSpec,
    geocoder: &G,
) -> Result<Coordinates, ResolveError> {
    match spec {
        LocationSpec::Coordinates(coords) => Ok(coords),
        LocationSpec::PlaceName(name) => {
            let matches = geocoder.search(&name, 1).await?;
            matches
                .first()
                .map(|found| Coordinates {
                    lat: found.lat,
                    lon: found.lon,
                })
                .ok_or(ResolveError::NotFound(name))
        }
    }
}
