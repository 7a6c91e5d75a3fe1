//! Built-in tools.

pub mod weather;

pub use weather::{
    ForecastTool, WeatherClient, WeatherConfig, WeatherTool, register_weather_tools,
    weather_tools,
};
