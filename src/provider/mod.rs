pub mod normalize;
pub mod openweather;
pub mod types;

pub use openweather::{OpenWeatherClient, OpenWeatherError};
