pub mod mock;
pub mod provider;
pub mod providers;
pub mod types;

pub use provider::{ChatOptions, LLMError, LLMProvider, LLMStream, ToolChoice};
pub use providers::OpenAIProvider;
pub use types::{LLMChunk, TokenUsage};
