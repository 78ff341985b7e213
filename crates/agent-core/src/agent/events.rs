use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    ToolStart {
        tool_call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    ToolComplete {
        tool_call_id: String,
        tool_name: String,
    },

    /// A tool asked the model to try again; `reason` is what the model sees.
    ToolRetry {
        tool_call_id: String,
        tool_name: String,
        reason: String,
    },

    ToolError {
        tool_call_id: String,
        error: String,
    },

    /// Emitted whenever the structured view shown to the sink changes
    StructuredUpdate {
        view: serde_json::Value,
        is_final: bool,
    },

    Complete {
        rounds: usize,
    },

    Error {
        message: String,
    },
}
