pub mod accumulator;
pub mod executor;
pub mod params;
pub mod registry;
pub mod types;

pub use accumulator::{PartialToolCall, ToolCallAccumulator, ToolCallDelta};
pub use executor::{execute_tool_call, parse_tool_args, ToolError};
pub use params::{ParamKind, ParameterSchema, ParameterSpec, ToolArgs};
pub use registry::{normalize_tool_name, RegistryError, SharedTool, Tool, ToolRegistry};
pub use types::{FunctionCall, FunctionSchema, ToolCall, ToolOutput, ToolSchema};
