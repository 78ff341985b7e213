use thiserror::Error;

use crate::tools::{ToolCall, ToolOutput, ToolRegistry};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Recoverable: the reason is handed back to the model as a correction.
    #[error("{0}")]
    Retry(String),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Execution failed: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;

impl ToolError {
    pub fn retry(reason: impl Into<String>) -> Self {
        ToolError::Retry(reason.into())
    }

    /// Whether the model, rather than the caller, is at fault.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, ToolError::NotFound(_) | ToolError::InvalidArguments(_))
    }
}

pub fn parse_tool_args(arguments: &str) -> Result<serde_json::Value> {
    let args_raw = arguments.trim();

    if args_raw.is_empty() {
        return Ok(serde_json::json!({}));
    }

    serde_json::from_str(args_raw)
        .map_err(|error| ToolError::InvalidArguments(format!("Invalid JSON arguments: {error}")))
}

/// Runs one model-requested tool call.
///
/// Arguments are parsed and checked against the tool's declared parameters
/// before the tool body runs; a mismatch never reaches the external call.
pub async fn execute_tool_call<D>(
    registry: &ToolRegistry<D>,
    call: &ToolCall,
    deps: &D,
) -> Result<ToolOutput>
where
    D: Send + Sync + 'static,
{
    let tool = registry
        .get(&call.function.name)
        .ok_or_else(|| ToolError::NotFound(format!("Tool '{}' not found", call.function.name)))?;

    let raw_args = parse_tool_args(&call.function.arguments)?;
    let args = tool.parameters().validate(&raw_args)?;

    log::debug!(
        "Invoking tool '{}' (call {}) with {}",
        tool.name(),
        call.id,
        raw_args
    );

    tool.invoke(deps, args).await
}
