use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Temperature units: metric (Celsius), imperial (Fahrenheit), standard (Kelvin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub fn wind_speed_label(self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" => Ok(Units::Standard),
            other => Err(format!(
                "Invalid units: {}. Must be one of metric, imperial, standard",
                other
            )),
        }
    }
}

/// Static description of the unit systems, served as `weather://units/info`.
pub fn units_info(default: Units) -> Value {
    json!({
        "available_units": {
            "metric": {
                "temperature": "Celsius",
                "wind_speed": "meter/sec",
                "description": "Metric system (most countries)"
            },
            "imperial": {
                "temperature": "Fahrenheit",
                "wind_speed": "miles/hour",
                "description": "Imperial system (US)"
            },
            "standard": {
                "temperature": "Kelvin",
                "wind_speed": "meter/sec",
                "description": "Scientific standard"
            }
        },
        "default": default.as_str()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("metric".parse::<Units>().unwrap(), Units::Metric);
        assert_eq!(" Imperial ".parse::<Units>().unwrap(), Units::Imperial);
        assert_eq!("standard".parse::<Units>().unwrap(), Units::Standard);
        assert!("kelvin".parse::<Units>().is_err());
    }

    #[test]
    fn test_wind_speed_label() {
        assert_eq!(Units::Metric.wind_speed_label(), "m/s");
        assert_eq!(Units::Imperial.wind_speed_label(), "mph");
        assert_eq!(Units::Standard.wind_speed_label(), "m/s");
    }

    #[test]
    fn test_units_info_reports_default() {
        let info = units_info(Units::Imperial);
        assert_eq!(info["default"], "imperial");
        assert_eq!(info["available_units"]["standard"]["temperature"], "Kelvin");
    }
}
