//! Reshaping of raw OpenWeather payloads into the shapes returned to callers.
//!
//! Timestamps are rendered as wall-clock strings in the timezone passed in
//! (the server's local zone at runtime).

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

use super::openweather::OpenWeatherError;
use super::types::*;
use crate::location::Coordinates;
use crate::units::Units;

const ICON_BASE_URL: &str = "https://openweathermap.org/img/w";

#[derive(Debug, Clone, Serialize)]
pub struct LocationInfo {
    pub name: Option<String>,
    pub country: Option<String>,
    pub coordinates: Coord,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub condition: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindInfo {
    pub speed: f64,
    pub direction: f64,
    pub unit: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherDetails {
    pub humidity: String,
    pub pressure: String,
    pub wind: WindInfo,
    pub clouds: String,
    pub visibility: String,
    pub sunrise: String,
    pub sunset: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentWeatherReport {
    pub location: LocationInfo,
    pub current: CurrentConditions,
    pub units: Units,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<WeatherDetails>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastSlot {
    pub time: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub condition: String,
    pub description: String,
    pub humidity: String,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub clouds: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub location: LocationInfo,
    /// Local calendar date (`YYYY-MM-DD`) to that day's slots, in order.
    pub forecast: BTreeMap<String, Vec<ForecastSlot>>,
    pub units: Units,
    pub timezone: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationMatch {
    pub name: String,
    pub country: Option<String>,
    pub state: String,
    pub lat: f64,
    pub lon: f64,
    pub coordinates_string: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub count: usize,
    pub results: Vec<LocationMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZipLocation {
    pub zip: String,
    pub country: String,
    pub name: Option<String>,
    pub coordinates: Coord,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZipConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub condition: String,
    pub description: String,
    pub humidity: String,
    pub pressure: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZipWeatherReport {
    pub location: ZipLocation,
    pub current: ZipConditions,
    pub units: Units,
}

#[derive(Debug, Clone, Serialize)]
pub struct AirQualityIndex {
    pub aqi: u8,
    pub level: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pollutants {
    pub co: String,
    pub no2: String,
    pub o3: String,
    pub so2: String,
    pub pm2_5: String,
    pub pm10: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AirQualityReport {
    pub location: Coordinates,
    pub air_quality: AirQualityIndex,
    pub pollutants: Pollutants,
    pub timestamp: String,
}

pub fn aqi_level(aqi: u8) -> &'static str {
    match aqi {
        1 => "Good",
        2 => "Fair",
        3 => "Moderate",
        4 => "Poor",
        5 => "Very Poor",
        _ => "Unknown",
    }
}

pub fn aqi_description(aqi: u8) -> &'static str {
    match aqi {
        1 => "Air quality is satisfactory, and air pollution poses little or no risk.",
        2 => "Air quality is acceptable. However, there may be a risk for some people who are unusually sensitive.",
        3 => "Members of sensitive groups may experience health effects. The general public is less likely to be affected.",
        4 => "Some members of the general public may experience health effects; members of sensitive groups may experience more serious health effects.",
        5 => "Health alert: The risk of health effects is increased for everyone.",
        _ => "Unknown air quality level",
    }
}

pub fn icon_url(icon: &str) -> String {
    format!("{}/{}.png", ICON_BASE_URL, icon)
}

fn local_time<Tz: TimeZone>(ts: i64, tz: &Tz) -> Result<DateTime<Tz>, OpenWeatherError> {
    DateTime::from_timestamp(ts, 0)
        .map(|utc| utc.with_timezone(tz))
        .ok_or_else(|| OpenWeatherError::MalformedPayload(format!("timestamp {} out of range", ts)))
}

fn primary_condition(conditions: &[Condition]) -> Result<&Condition, OpenWeatherError> {
    conditions
        .first()
        .ok_or_else(|| OpenWeatherError::MalformedPayload("missing weather condition".to_string()))
}

pub fn current_weather<Tz>(
    raw: &CurrentWeatherResponse,
    units: Units,
    include_details: bool,
    tz: &Tz,
) -> Result<CurrentWeatherReport, OpenWeatherError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let condition = primary_condition(&raw.weather)?;

    let details = if include_details {
        Some(WeatherDetails {
            humidity: format!("{}%", raw.main.humidity),
            pressure: format!("{} hPa", raw.main.pressure),
            wind: WindInfo {
                speed: raw.wind.speed,
                direction: raw.wind.deg.unwrap_or(0.0),
                unit: units.wind_speed_label(),
            },
            clouds: format!("{}%", raw.clouds.all),
            visibility: match raw.visibility {
                Some(meters) => format!("{} meters", meters),
                None => "N/A meters".to_string(),
            },
            sunrise: local_time(raw.sys.sunrise, tz)?.format("%H:%M").to_string(),
            sunset: local_time(raw.sys.sunset, tz)?.format("%H:%M").to_string(),
        })
    } else {
        None
    };

    Ok(CurrentWeatherReport {
        location: LocationInfo {
            name: raw.name.clone(),
            country: raw.sys.country.clone(),
            coordinates: raw.coord.clone(),
        },
        current: CurrentConditions {
            temperature: raw.main.temp,
            feels_like: raw.main.feels_like,
            condition: condition.main.clone(),
            description: condition.description.clone(),
            icon: icon_url(&condition.icon),
        },
        units,
        timestamp: local_time(raw.dt, tz)?
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
        details,
    })
}

pub fn forecast<Tz>(
    raw: &Forecast3hResponse,
    units: Units,
    tz: &Tz,
) -> Result<ForecastReport, OpenWeatherError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut days: BTreeMap<String, Vec<ForecastSlot>> = BTreeMap::new();

    for item in &raw.list {
        let at = local_time(item.dt, tz)?;
        let condition = primary_condition(&item.weather)?;

        days.entry(at.format("%Y-%m-%d").to_string())
            .or_default()
            .push(ForecastSlot {
                time: at.format("%H:%M").to_string(),
                temperature: item.main.temp,
                feels_like: item.main.feels_like,
                condition: condition.main.clone(),
                description: condition.description.clone(),
                humidity: format!("{}%", item.main.humidity),
                wind_speed: item.wind.speed,
                precipitation: item.precipitation(),
                clouds: format!("{}%", item.clouds.all),
            });
    }

    Ok(ForecastReport {
        location: LocationInfo {
            name: Some(raw.city.name.clone()),
            country: Some(raw.city.country.clone()),
            coordinates: raw.city.coord.clone(),
        },
        forecast: days,
        units,
        timezone: raw.city.timezone,
    })
}

pub fn search_results(query: &str, raw: &[GeocodeMatch]) -> SearchReport {
    let results: Vec<LocationMatch> = raw
        .iter()
        .map(|found| LocationMatch {
            name: found.name.clone(),
            country: found.country.clone(),
            state: found.state.clone().unwrap_or_default(),
            lat: found.lat,
            lon: found.lon,
            coordinates_string: format!("{},{}", found.lat, found.lon),
        })
        .collect();

    let message = results
        .is_empty()
        .then(|| format!("No locations found for '{}'", query));

    SearchReport {
        query: query.to_string(),
        count: results.len(),
        results,
        message,
    }
}

pub fn zip_weather(
    raw: &CurrentWeatherResponse,
    zip_code: &str,
    country_code: &str,
    units: Units,
) -> Result<ZipWeatherReport, OpenWeatherError> {
    let condition = primary_condition(&raw.weather)?;

    Ok(ZipWeatherReport {
        location: ZipLocation {
            zip: zip_code.to_string(),
            country: country_code.to_string(),
            name: raw.name.clone(),
            coordinates: raw.coord.clone(),
        },
        current: ZipConditions {
            temperature: raw.main.temp,
            feels_like: raw.main.feels_like,
            condition: condition.main.clone(),
            description: condition.description.clone(),
            humidity: format!("{}%", raw.main.humidity),
            pressure: format!("{} hPa", raw.main.pressure),
        },
        units,
    })
}

/// Returns `None` when the upstream list is empty.
pub fn air_quality<Tz>(
    raw: &AirPollutionResponse,
    coords: Coordinates,
    tz: &Tz,
) -> Result<Option<AirQualityReport>, OpenWeatherError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(sample) = raw.list.first() else {
        return Ok(None);
    };

    let aqi = sample.main.aqi;
    let concentration = |value: f64| format!("{} μg/m³", value);
    let c = &sample.components;

    Ok(Some(AirQualityReport {
        location: coords,
        air_quality: AirQualityIndex {
            aqi,
            level: aqi_level(aqi),
            description: aqi_description(aqi),
        },
        pollutants: Pollutants {
            co: concentration(c.co),
            no2: concentration(c.no2),
            o3: concentration(c.o3),
            so2: concentration(c.so2),
            pm2_5: concentration(c.pm2_5),
            pm10: concentration(c.pm10),
        },
        timestamp: local_time(sample.dt, tz)?
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use serde_json::json;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn london() -> CurrentWeatherResponse {
        serde_json::from_value(json!({
            "coord": {"lon": -0.1257, "lat": 51.5085},
            "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
            "main": {"temp": 12.5, "feels_like": 11.8, "pressure": 1012, "humidity": 81},
            "visibility": 10000,
            "wind": {"speed": 4.6, "deg": 250},
            "clouds": {"all": 75},
            "dt": 1_700_000_000,
            "sys": {"country": "GB", "sunrise": 1_699_946_400, "sunset": 1_699_979_400},
            "timezone": 0,
            "name": "London"
        }))
        .unwrap()
    }

    #[test]
    fn test_current_weather_with_details() {
        let report = current_weather(&london(), Units::Metric, true, &utc()).unwrap();

        assert_eq!(report.location.name.as_deref(), Some("London"));
        assert_eq!(report.location.country.as_deref(), Some("GB"));
        assert_eq!(report.current.condition, "Rain");
        assert_eq!(report.current.icon, "https://openweathermap.org/img/w/10d.png");
        assert_eq!(report.timestamp, "2023-11-14T22:13:20");

        let details = report.details.unwrap();
        assert_eq!(details.humidity, "81%");
        assert_eq!(details.pressure, "1012 hPa");
        assert_eq!(details.clouds, "75%");
        assert_eq!(details.visibility, "10000 meters");
        assert_eq!(details.wind.unit, "m/s");
        assert_eq!(details.wind.direction, 250.0);
        assert_eq!(details.sunrise, "07:20");
        assert_eq!(details.sunset, "16:30");
    }

    #[test]
    fn test_current_weather_in_other_timezone_and_units() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let mut raw = london();
        raw.visibility = None;
        raw.wind.deg = None;

        let report = current_weather(&raw, Units::Imperial, true, &plus_two).unwrap();
        let details = report.details.unwrap();

        assert_eq!(report.timestamp, "2023-11-15T00:13:20");
        assert_eq!(details.visibility, "N/A meters");
        assert_eq!(details.wind.direction, 0.0);
        assert_eq!(details.wind.unit, "mph");
    }

    #[test]
    fn test_current_weather_without_details_omits_field() {
        let report = current_weather(&london(), Units::Metric, false, &utc()).unwrap();
        let value = serde_json::to_value(&report).unwrap();

        assert!(value.get("details").is_none());
        assert_eq!(value["units"], "metric");
    }

    #[test]
    fn test_missing_condition_is_malformed() {
        let mut raw = london();
        raw.weather.clear();

        let result = current_weather(&raw, Units::Metric, true, &utc());
        assert!(matches!(result, Err(OpenWeatherError::MalformedPayload(_))));
    }

    #[test]
    fn test_forecast_groups_by_local_date() {
        let slot = |dt: i64, temp: f64, rain: Option<f64>| {
            json!({
                "dt": dt,
                "main": {"temp": temp, "feels_like": temp - 1.0, "humidity": 70},
                "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01n"}],
                "clouds": {"all": 5},
                "wind": {"speed": 2.0},
                "rain": rain.map(|mm| json!({"3h": mm})),
                "snow": {"3h": 0.5}
            })
        };
        // 2023-11-14 18:00, 21:00 and 2023-11-15 00:00 UTC
        let raw: Forecast3hResponse = serde_json::from_value(json!({
            "list": [
                slot(1_699_984_800, 10.0, None),
                slot(1_699_995_600, 9.0, Some(1.25)),
                slot(1_700_006_400, 8.0, None)
            ],
            "city": {"name": "London", "country": "GB", "coord": {"lat": 51.5, "lon": -0.12}, "timezone": 0}
        }))
        .unwrap();

        let report = forecast(&raw, Units::Metric, &utc()).unwrap();

        assert_eq!(report.forecast.len(), 2);
        let first_day = &report.forecast["2023-11-14"];
        assert_eq!(first_day.len(), 2);
        assert_eq!(first_day[0].time, "18:00");
        assert_eq!(first_day[1].time, "21:00");
        assert_eq!(first_day[1].precipitation, 1.75);
        assert_eq!(first_day[0].precipitation, 0.5);
        assert_eq!(report.forecast["2023-11-15"][0].time, "00:00");
        assert_eq!(report.timezone, 0);
    }

    #[test]
    fn test_search_results() {
        let raw: Vec<GeocodeMatch> = serde_json::from_value(json!([
            {"name": "Springfield", "lat": 39.8, "lon": -89.65, "country": "US", "state": "Illinois"},
            {"name": "Springfield", "lat": 37.2, "lon": -93.29, "country": "US"}
        ]))
        .unwrap();

        let report = search_results("Springfield", &raw);

        assert_eq!(report.count, 2);
        assert_eq!(report.results[0].coordinates_string, "39.8,-89.65");
        assert_eq!(report.results[1].state, "");
        assert!(report.message.is_none());
    }

    #[test]
    fn test_empty_search_has_message() {
        let report = search_results("Atlantis", &[]);
        assert_eq!(report.count, 0);
        assert_eq!(report.message.as_deref(), Some("No locations found for 'Atlantis'"));
    }

    #[test]
    fn test_zip_weather() {
        let report = zip_weather(&london(), "SW1A", "GB", Units::Metric).unwrap();
        assert_eq!(report.location.zip, "SW1A");
        assert_eq!(report.current.humidity, "81%");
        assert_eq!(report.current.pressure, "1012 hPa");
    }

    #[test]
    fn test_air_quality_levels() {
        assert_eq!(aqi_level(1), "Good");
        assert_eq!(aqi_level(5), "Very Poor");
        assert_eq!(aqi_level(9), "Unknown");
        assert_eq!(aqi_description(0), "Unknown air quality level");

        let raw: AirPollutionResponse = serde_json::from_value(json!({
            "list": [{
                "dt": 1_700_000_000,
                "main": {"aqi": 3},
                "components": {"co": 201.94, "no2": 0.77, "o3": 68.66, "so2": 0.64, "pm2_5": 0.5, "pm10": 0.54}
            }]
        }))
        .unwrap();
        let coords = Coordinates { lat: 50.0, lon: 50.0 };

        let report = air_quality(&raw, coords, &utc()).unwrap().unwrap();
        assert_eq!(report.air_quality.level, "Moderate");
        assert_eq!(report.pollutants.co, "201.94 μg/m³");
        assert_eq!(report.pollutants.pm2_5, "0.5 μg/m³");

        let empty = AirPollutionResponse { list: Vec::new() };
        assert!(air_quality(&empty, coords, &utc()).unwrap().is_none());
    }
}
