mod http;

pub mod forecast;
pub mod geocode;

pub use forecast::WeatherForecastTool;
pub use geocode::GeocodeCityTool;
