//! HTTP-backed weather tools and the dependency context they share.
//!
//! Tools implement `agent_core::Tool<DependencyContext>` and are registered
//! into a `ToolRegistry` before a run starts.

mod executor;
pub mod context;
pub mod tools;

pub use context::{DependencyContext, OpenWeatherEndpoints, FORECAST_URL, GEOCODING_URL};
pub use executor::{register_weather_tools, weather_tools, WEATHER_TOOL_NAMES};
pub use tools::{
    forecast::FORECAST_NOT_FOUND, geocode::LOCATION_NOT_FOUND, GeocodeCityTool,
    WeatherForecastTool,
};
