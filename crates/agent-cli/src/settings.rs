use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Args;

use agent_llm::providers::openai::DEFAULT_BASE_URL;
use agent_llm::{LLMProvider, OpenAIProvider};
use agent_loop::{AgentLoopConfig, ToolDispatch};

/// Process-wide settings, read once from flags, the environment and `.env`.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// Overrides the model each command picks by default
    #[arg(long, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub openweather_api_key: Option<String>,

    /// Attempts allowed for a call the model keeps getting wrong
    #[arg(long, default_value_t = 2)]
    pub max_retries: usize,

    /// Coalescing window for streamed results, in milliseconds
    #[arg(long, default_value_t = 10)]
    pub debounce_ms: u64,

    /// Run the tool calls of one reply one after another
    #[arg(long)]
    pub serial_tools: bool,

    /// Enable debug logging and print the full conversation
    #[arg(long, short, global = true)]
    pub debug: bool,
}

impl Settings {
    pub fn provider(&self, default_model: &str) -> Result<Arc<dyn LLMProvider>> {
        let api_key = self
            .openai_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))?;
        let model = self.model.as_deref().unwrap_or(default_model);

        log::debug!("Using model {} at {}", model, self.openai_base_url);

        Ok(Arc::new(
            OpenAIProvider::new(api_key)
                .with_base_url(self.openai_base_url.as_str())
                .with_model(model),
        ))
    }

    pub fn loop_config(&self) -> AgentLoopConfig {
        let dispatch = if self.serial_tools {
            ToolDispatch::Serial
        } else {
            ToolDispatch::Concurrent
        };

        AgentLoopConfig::default()
            .with_max_retries(self.max_retries)
            .with_debounce(Duration::from_millis(self.debounce_ms))
            .with_tool_dispatch(dispatch)
    }
}
