use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub id: i32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentMain {
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    pub deg: Option<f64>,
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clouds {
    pub all: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentSys {
    pub country: Option<String>,
    pub sunrise: i64,
    pub sunset: i64,
}

/// `GET /weather`, by name, coordinates or ZIP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherResponse {
    pub coord: Coord,
    pub weather: Vec<Condition>,
    pub main: CurrentMain,
    pub visibility: Option<i64>,
    pub wind: Wind,
    pub clouds: Clouds,
    pub dt: i64,
    pub sys: CurrentSys,
    pub timezone: Option<i32>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast3hMain {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast3hItem {
    pub dt: i64,
    pub main: Forecast3hMain,
    pub weather: Vec<Condition>,
    pub clouds: Clouds,
    pub wind: Wind,
    pub pop: Option<f64>,
    pub rain: Option<HashMap<String, f64>>,
    pub snow: Option<HashMap<String, f64>>,
}

impl Forecast3hItem {
    /// Rain plus snow over the 3-hour slot, in mm.
    pub fn precipitation(&self) -> f64 {
        let three_hours = |amounts: &Option<HashMap<String, f64>>| {
            amounts
                .as_ref()
                .and_then(|a| a.get("3h"))
                .copied()
                .unwrap_or(0.0)
        };
        three_hours(&self.rain) + three_hours(&self.snow)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast3hCity {
    pub name: String,
    pub country: String,
    pub coord: Coord,
    pub timezone: i32,
}

/// `GET /forecast`, 3-hour resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast3hResponse {
    pub list: Vec<Forecast3hItem>,
    pub city: Forecast3hCity,
}

/// One hit from `GET /direct` on the geocoding API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeMatch {
    pub name: String,
    pub local_names: Option<HashMap<String, String>>,
    pub lat: f64,
    pub lon: f64,
    pub country: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirQualityMain {
    pub aqi: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirComponents {
    pub co: f64,
    pub no2: f64,
    pub o3: f64,
    pub so2: f64,
    pub pm2_5: f64,
    pub pm10: f64,
    pub no: Option<f64>,
    pub nh3: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirPollutionItem {
    pub dt: i64,
    pub main: AirQualityMain,
    pub components: AirComponents,
}

/// `GET /air_pollution`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirPollutionResponse {
    #[serde(default)]
    pub list: Vec<AirPollutionItem>,
}
