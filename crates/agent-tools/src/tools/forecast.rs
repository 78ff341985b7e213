use agent_core::{ParamKind, ParameterSchema, ParameterSpec, Tool, ToolArgs, ToolError, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;

use super::http::{credential_query, get_json, is_empty_payload};
use crate::context::DependencyContext;

pub const FORECAST_NOT_FOUND: &str = "Could not find the weather information.";

#[derive(Debug, Deserialize)]
struct ForecastArgs {
    lat: f64,
    lon: f64,
}

/// Fetches the multi-day forecast for a coordinate, in metric units.
///
/// The provider's payload is handed to the model untouched.
pub struct WeatherForecastTool;

#[async_trait]
impl Tool<DependencyContext> for WeatherForecastTool {
    fn name(&self) -> &str {
        "get_weather_forecast"
    }

    fn description(&self) -> &str {
        "Get the weather forecast for a location given its latitude and longitude."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
            .param(ParameterSpec::required("lat", ParamKind::Number).describe("Latitude of the location"))
            .param(ParameterSpec::required("lon", ParamKind::Number).describe("Longitude of the location"))
    }

    async fn invoke(&self, deps: &DependencyContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: ForecastArgs = args.parse()?;

        let mut query = vec![("lat", args.lat.to_string()), ("lon", args.lon.to_string())];
        query.extend(credential_query(deps.credential()));
        query.push(("units", "metric".to_string()));

        let data = get_json(deps.http_client(), &deps.endpoints().forecast, &query).await?;

        let no_entries = data
            .get("list")
            .and_then(|list| list.as_array())
            .is_some_and(|entries| entries.is_empty());
        if is_empty_payload(&data) || no_entries {
            log::info!("No forecast for ({}, {})", args.lat, args.lon);
            return Err(ToolError::retry(FORECAST_NOT_FOUND));
        }

        Ok(ToolOutput::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OpenWeatherEndpoints;
    use agent_core::{execute_tool_call, ToolCall, ToolRegistry};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn network_tests_disabled() -> bool {
        std::env::var_os("CODEX_SANDBOX_NETWORK_DISABLED").is_some()
    }

    fn registry() -> ToolRegistry<DependencyContext> {
        let registry = ToolRegistry::new();
        registry.register(WeatherForecastTool).unwrap();
        registry
    }

    fn deps(server: &MockServer) -> DependencyContext {
        DependencyContext::new(Some("secret".to_string()))
            .with_endpoints(OpenWeatherEndpoints::with_base(&server.uri()))
    }

    #[tokio::test]
    async fn requests_metric_forecast_and_passes_payload_through() {
        if network_tests_disabled() {
            return;
        }

        let server = MockServer::start().await;
        let payload = json!({
            "cod": "200",
            "list": [{"dt_txt": "2024-05-02 00:00:00", "main": {"temp": 19.3}, "weather": [{"description": "clear sky"}]}],
            "city": {"name": "Kobe"}
        });
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("lat", "34.6901"))
            .and(query_param("lon", "135.1955"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let call = ToolCall::function(
            "call_2",
            "get_weather_forecast",
            r#"{"lat": 34.6901, "lon": 135.1955}"#,
        );
        let output = execute_tool_call(&registry(), &call, &deps(&server)).await.unwrap();

        assert_eq!(output.content, payload);
    }

    #[tokio::test]
    async fn empty_forecast_asks_model_to_retry() {
        if network_tests_disabled() {
            return;
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cod": "200", "list": []})))
            .mount(&server)
            .await;

        let call = ToolCall::function("call_2", "get_weather_forecast", r#"{"lat": 0, "lon": 0}"#);
        let error = execute_tool_call(&registry(), &call, &deps(&server)).await.unwrap_err();

        assert_eq!(error, ToolError::Retry(FORECAST_NOT_FOUND.to_string()));
    }

    #[tokio::test]
    async fn string_coordinates_are_rejected_before_the_request() {
        if network_tests_disabled() {
            return;
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let call = ToolCall::function(
            "call_2",
            "get_weather_forecast",
            r#"{"lat": "34.69", "lon": "135.19"}"#,
        );
        let error = execute_tool_call(&registry(), &call, &deps(&server)).await.unwrap_err();

        assert!(matches!(error, ToolError::InvalidArguments(ref m) if m.contains("'lat' must be number")));
    }

    #[tokio::test]
    async fn server_error_keeps_its_status() {
        if network_tests_disabled() {
            return;
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let call = ToolCall::function("call_2", "get_weather_forecast", r#"{"lat": 1.5, "lon": 2.5}"#);
        let error = execute_tool_call(&registry(), &call, &deps(&server)).await.unwrap_err();

        assert_eq!(
            error,
            ToolError::HttpStatus {
                status: 503,
                message: "upstream unavailable".to_string()
            }
        );
    }
}
