use agent_core::tools::{RegistryError, ToolRegistry};

use crate::context::DependencyContext;
use crate::tools::{GeocodeCityTool, WeatherForecastTool};

/// Names of the tools registered by [`weather_tools`].
pub const WEATHER_TOOL_NAMES: [&str; 2] = ["get_lat_lon", "get_weather_forecast"];

/// Registers the geocoding and forecast tools into `registry`.
pub fn register_weather_tools(
    registry: &ToolRegistry<DependencyContext>,
) -> Result<(), RegistryError> {
    registry.register(GeocodeCityTool)?;
    registry.register(WeatherForecastTool)?;
    Ok(())
}

/// A registry holding exactly the weather tools.
pub fn weather_tools() -> Result<ToolRegistry<DependencyContext>, RegistryError> {
    let registry = ToolRegistry::new();
    register_weather_tools(&registry)?;
    Ok(registry)
}
