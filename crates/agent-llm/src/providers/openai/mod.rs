use async_trait::async_trait;
use reqwest::Client;

use crate::provider::{ChatOptions, LLMError, LLMProvider, LLMStream, Result};
use agent_core::{tools::ToolSchema, Message};

use super::common::openai_compat::build_openai_compat_body;
use super::common::sse::llm_stream_from_sse;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &ChatOptions,
    ) -> Result<LLMStream> {
        let body = build_openai_compat_body(&self.model, messages, tools, options);

        log::debug!(
            "OpenAI request: model={}, messages={}, tools={}, tool_choice={}",
            self.model,
            messages.len(),
            tools.len(),
            options.tool_choice.as_str()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(LLMError::Api(format!("HTTP {}: {}", status, text)));
        }

        Ok(llm_stream_from_sse(response))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolChoice;
    use crate::types::LLMChunk;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn network_tests_disabled() -> bool {
        std::env::var_os("CODEX_SANDBOX_NETWORK_DISABLED").is_some()
    }

    #[test]
    fn test_builder_defaults_and_overrides() {
        let provider = OpenAIProvider::new("test_key");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.model_name(), DEFAULT_MODEL);

        let provider = OpenAIProvider::new("test_key")
            .with_base_url("http://localhost:8080/v1/")
            .with_model("gpt-4o-mini");
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(provider.model_name(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_streams_tool_call_deltas() {
        if network_tests_disabled() {
            return;
        }

        let server = MockServer::start().await;
        let sse_body = concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"type\":\"function\",\"function\":{\"name\":\"get_lat_lon\",\"arguments\":\"\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"city_name\\\":\\\"Kobe\\\"}\"}}]}}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":82,\"completion_tokens\":17,\"total_tokens\":99}}\n\n",
            "data: [DONE]\n\n",
        );

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "stream": true,
                "tool_choice": "required",
                "stream_options": { "include_usage": true },
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new("sk-test").with_base_url(format!("{}/v1", server.uri()));
        let tools = vec![ToolSchema::function(
            "get_lat_lon",
            "lookup",
            json!({"type": "object", "properties": {}}),
        )];
        let options = ChatOptions {
            tool_choice: ToolChoice::Required,
            ..ChatOptions::default()
        };

        let stream = provider
            .chat_stream(&[Message::user("Kobe?")], &tools, &options)
            .await
            .expect("stream");
        let chunks: Vec<LLMChunk> = stream.map(|item| item.expect("chunk")).collect().await;

        assert_eq!(chunks.len(), 4);
        let LLMChunk::ToolCalls(second) = &chunks[1] else {
            panic!("expected tool call delta, got {:?}", chunks[1]);
        };
        assert_eq!(second[0].arguments.as_deref(), Some(r#"{"city_name":"Kobe"}"#));
        assert_eq!(
            chunks[2],
            LLMChunk::Usage {
                prompt_tokens: 82,
                completion_tokens: 17,
            }
        );
        assert_eq!(chunks[3], LLMChunk::Done);
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        if network_tests_disabled() {
            return;
        }

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#"{"error":{"message":"Invalid API key","code":"invalid_api_key"}}"#,
            ))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new("bad").with_base_url(server.uri());

        let error = match provider
            .chat_stream(&[Message::user("hi")], &[], &ChatOptions::default())
            .await
        {
            Ok(_) => panic!("expected an error"),
            Err(error) => error,
        };

        match error {
            LLMError::Api(message) => {
                assert!(message.starts_with("HTTP 401"));
                assert!(message.contains("invalid_api_key"));
            }
            other => panic!("expected LLMError::Api, got {other:?}"),
        }
    }
}
