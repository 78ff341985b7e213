use thiserror::Error;

use crate::tools::ToolError;

/// The single failure a caller of a run can observe.
///
/// Retryable tool outcomes never appear here directly; they are turned into
/// corrective messages until the retry budget runs out.
#[derive(Error, Debug)]
pub enum AgentError {
    /// A tool or the model broke a declared contract (bad parameters,
    /// unknown tool, structured output violating its schema).
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// A tool's external call failed outright.
    #[error("External call failed: {0}")]
    External(String),

    /// The model provider failed outright.
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Gave up after {attempts} attempts: {reason}")]
    RetryBudgetExceeded { attempts: usize, reason: String },

    #[error("No final answer after {0} rounds")]
    RoundLimitExceeded(usize),

    #[error("Cancelled")]
    Cancelled,
}

impl AgentError {
    /// Maps a fatal tool failure onto the run-level taxonomy.
    pub fn from_tool_error(tool_name: &str, error: ToolError) -> Self {
        match error {
            ToolError::NotFound(_) | ToolError::InvalidArguments(_) => {
                AgentError::ContractViolation(format!("{tool_name}: {error}"))
            }
            ToolError::HttpStatus { .. } | ToolError::Execution(_) | ToolError::Retry(_) => {
                AgentError::External(format!("{tool_name}: {error}"))
            }
        }
    }

    pub fn is_retry_budget_exceeded(&self) -> bool {
        matches!(self, AgentError::RetryBudgetExceeded { .. })
    }
}
