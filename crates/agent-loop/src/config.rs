use std::time::Duration;

use tokio::sync::mpsc;

use agent_core::{AgentEvent, ToolError};

pub const DEFAULT_MAX_RETRIES: usize = 1;
pub const DEFAULT_MAX_ROUNDS: usize = 50;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(10);

/// How the tool calls of one model reply are run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolDispatch {
    /// One after another, in the order the model gave them.
    Serial,
    /// All at once; results are still appended in request order.
    #[default]
    Concurrent,
}

/// Configuration for one agent.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub system_prompt: Option<String>,
    /// Retryable failures allowed per run. The failure that reaches this
    /// count ends the run.
    pub max_retries: usize,
    /// Upper bound on model round trips for runs that never settle.
    pub max_rounds: usize,
    pub tool_dispatch: ToolDispatch,
    /// Coalescing window for streamed structured output; zero disables it.
    pub debounce: Duration,
    /// Tool HTTP statuses handed back to the model instead of failing the run.
    pub retryable_http_statuses: Vec<u16>,
    pub max_output_tokens: Option<u32>,
    pub event_tx: Option<mpsc::Sender<AgentEvent>>,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_retries: DEFAULT_MAX_RETRIES,
            max_rounds: DEFAULT_MAX_ROUNDS,
            tool_dispatch: ToolDispatch::default(),
            debounce: DEFAULT_DEBOUNCE,
            retryable_http_statuses: Vec::new(),
            max_output_tokens: None,
            event_tx: None,
        }
    }
}

impl AgentLoopConfig {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_tool_dispatch(mut self, dispatch: ToolDispatch) -> Self {
        self.tool_dispatch = dispatch;
        self
    }

    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    pub fn with_event_sender(mut self, event_tx: mpsc::Sender<AgentEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Whether `error` becomes a corrective message rather than a fatal failure.
    pub fn is_retryable(&self, error: &ToolError) -> bool {
        match error {
            ToolError::Retry(_) => true,
            ToolError::HttpStatus { status, .. } => self.retryable_http_statuses.contains(status),
            _ => false,
        }
    }

    pub(crate) async fn emit(&self, event: AgentEvent) {
        if let Some(event_tx) = &self.event_tx {
            let _ = event_tx.send(event).await;
        }
    }
}
