use std::fmt;

use agent_core::ToolCallDelta;

/// One decoded piece of a streamed model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum LLMChunk {
    Token(String),
    ToolCalls(Vec<ToolCallDelta>),
    /// Token counts the provider reported for this request.
    Usage {
        prompt_tokens: u64,
        completion_tokens: u64,
    },
    Done,
}

/// Token usage summed over one or more model requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub requests: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.requests += other.requests;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

impl fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests={} prompt_tokens={} completion_tokens={} total_tokens={}",
            self.requests,
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens()
        )
    }
}
