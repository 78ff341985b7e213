pub mod agent;
pub mod tools;

pub use agent::events::AgentEvent;
pub use agent::types::{Conversation, Message, Role};
pub use agent::AgentError;
pub use tools::{
    execute_tool_call, parse_tool_args, ParamKind, ParameterSchema, ParameterSpec, SharedTool,
    Tool, ToolArgs, ToolCall, ToolCallAccumulator, ToolCallDelta, ToolError, ToolOutput,
    ToolRegistry, ToolSchema,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
