use agent_core::{ParamKind, ParameterSchema, ParameterSpec, Tool, ToolArgs, ToolError, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::http::{credential_query, get_json, is_empty_payload};
use crate::context::DependencyContext;

pub const LOCATION_NOT_FOUND: &str = "Could not find the location.";

#[derive(Debug, Deserialize)]
struct GeocodeArgs {
    city_name: String,
}

/// Resolves a city name to candidate coordinates.
pub struct GeocodeCityTool;

#[async_trait]
impl Tool<DependencyContext> for GeocodeCityTool {
    fn name(&self) -> &str {
        "get_lat_lon"
    }

    fn description(&self) -> &str {
        "Get the latitude and longitude of a city. Returns a list of matching locations."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().param(
            ParameterSpec::required("city_name", ParamKind::String)
                .describe("Name of the city to look up, e.g. \"Kobe\""),
        )
    }

    async fn invoke(&self, deps: &DependencyContext, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: GeocodeArgs = args.parse()?;

        let mut query = vec![("q", args.city_name.clone())];
        query.extend(credential_query(deps.credential()));

        let data = get_json(deps.http_client(), &deps.endpoints().geocoding, &query).await?;

        if is_empty_payload(&data) {
            log::info!("No geocoding match for '{}'", args.city_name);
            return Err(ToolError::retry(LOCATION_NOT_FOUND));
        }
        if !matches!(data, Value::Array(_)) {
            return Err(ToolError::Execution(format!(
                "unexpected geocoding response: {data}"
            )));
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

    fn context(server: &MockServer, key: Option<&str>) -> DependencyContext {
        DependencyContext::new(key.map(str::to_string))
            .with_endpoints(OpenWeatherEndpoints::with_base(&server.uri()))
    }

    fn registry() -> ToolRegistry<DependencyContext> {
        let registry = ToolRegistry::new();
        registry.register(GeocodeCityTool).unwrap();
        registry
    }

    #[tokio::test]
    async fn resolves_city_to_candidates() {
        if network_tests_disabled() {
            return;
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "Kobe"))
            .and(query_param("appid", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "Kobe", "lat": 34.6901, "lon": 135.1955, "country": "JP"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let call = ToolCall::function("call_1", "get_lat_lon", r#"{"city_name":"Kobe"}"#);
        let output = execute_tool_call(&registry(), &call, &context(&server, Some("secret")))
            .await
            .unwrap();

        assert_eq!(output.content[0]["lat"], 34.6901);
        assert_eq!(output.content[0]["lon"], 135.1955);
    }

    #[tokio::test]
    async fn empty_result_asks_model_to_retry() {
        if network_tests_disabled() {
            return;
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "NoSuchPlace123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let call = ToolCall::function("call_1", "get_lat_lon", r#"{"city_name":"NoSuchPlace123"}"#);
        let error = execute_tool_call(&registry(), &call, &context(&server, Some("secret")))
            .await
            .unwrap_err();

        assert_eq!(error, ToolError::Retry(LOCATION_NOT_FOUND.to_string()));
    }

    #[tokio::test]
    async fn invalid_parameters_never_reach_the_network() {
        if network_tests_disabled() {
            return;
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let deps = context(&server, Some("secret"));
        for arguments in [r#"{"city_name": 7}"#, r#"{"city": "Kobe"}"#, r#"{}"#] {
            let call = ToolCall::function("call_1", "get_lat_lon", arguments);
            let error = execute_tool_call(&registry(), &call, &deps).await.unwrap_err();
            assert!(error.is_contract_violation(), "{arguments}: {error}");
        }
    }

    #[tokio::test]
    async fn error_status_is_reported_with_body() {
        if network_tests_disabled() {
            return;
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"cod": 401, "message": "Invalid API key."})),
            )
            .mount(&server)
            .await;

        let call = ToolCall::function("call_1", "get_lat_lon", r#"{"city_name":"Kobe"}"#);
        let error = execute_tool_call(&registry(), &call, &context(&server, None))
            .await
            .unwrap_err();

        match error {
            ToolError::HttpStatus { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Invalid API key."));
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_an_execution_error() {
        let deps = DependencyContext::new(None)
            .with_endpoints(OpenWeatherEndpoints::with_base("http://127.0.0.1:9"));

        let call = ToolCall::function("call_1", "get_lat_lon", r#"{"city_name":"Kobe"}"#);
        let error = execute_tool_call(&registry(), &call, &deps).await.unwrap_err();

        assert!(matches!(error, ToolError::Execution(_)), "{error}");
    }
}
