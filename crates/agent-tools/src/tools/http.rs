use agent_core::ToolError;
use reqwest::Client;
use serde_json::Value;

/// Longest slice of an error body kept in a [`ToolError::HttpStatus`].
const MAX_ERROR_BODY: usize = 300;

/// GETs `url` and decodes the body as JSON.
///
/// Non-2xx answers become [`ToolError::HttpStatus`]; transport and decoding
/// failures become [`ToolError::Execution`]. Whether a status is worth a retry
/// is decided by the caller.
pub(crate) async fn get_json(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, ToolError> {
    log::debug!(
        "GET {} ({})",
        url,
        query
            .iter()
            .filter(|(key, _)| *key != "appid")
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    );

    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| ToolError::Execution(format!("request to {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
        return Err(ToolError::HttpStatus {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ToolError::Execution(format!("invalid JSON from {url}: {e}")))
}

/// True for payloads that carry nothing the model can use.
pub(crate) fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

pub(crate) fn credential_query(credential: Option<&str>) -> Option<(&'static str, String)> {
    credential.map(|key| ("appid", key.to_string()))
}
