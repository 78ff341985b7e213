use crate::types::LLMChunk;
use agent_core::{tools::ToolSchema, Message};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMChunk>> + Send>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model may answer in text or call a tool.
    #[default]
    Auto,
    /// The model must call one of the offered tools.
    Required,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::Required => "required",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    pub max_output_tokens: Option<u32>,
    pub tool_choice: ToolChoice,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Starts one streamed completion over the whole conversation.
    ///
    /// # Arguments
    /// * `messages` - Conversation so far, in order
    /// * `tools` - Tool signatures the model may call
    /// * `options` - Output limit and tool-choice policy
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &ChatOptions,
    ) -> Result<LLMStream>;

    /// Model identifier used in log lines.
    fn model_name(&self) -> &str {
        "unknown"
    }
}
