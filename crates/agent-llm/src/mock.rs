//! Scripted [`LLMProvider`] for tests.
//!
//! Replies are replayed in the order they were queued; every request is
//! recorded so tests can assert on the exact conversation the model saw.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use agent_core::{tools::ToolSchema, Message, ToolCallDelta};
use async_trait::async_trait;
use futures::{stream, StreamExt};

use crate::provider::{ChatOptions, LLMError, LLMProvider, LLMStream, Result};
use crate::types::LLMChunk;

#[derive(Debug, Clone)]
pub enum MockReply {
    Chunks(Vec<LLMChunk>),
    /// `chat_stream` itself fails.
    Fail(String),
    /// The stream never yields; only cancellation ends the wait.
    Stall,
    /// Yields the chunks, then hangs before the reply is done.
    StallAfter(Vec<LLMChunk>),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Chunks(vec![LLMChunk::Token(text.into()), LLMChunk::Done])
    }

    pub fn tool_call(id: &str, name: &str, arguments: &str) -> Self {
        Self::tool_calls(&[(id, name, arguments)])
    }

    /// Several calls in one reply, each delivered whole.
    pub fn tool_calls(calls: &[(&str, &str, &str)]) -> Self {
        let deltas = calls
            .iter()
            .enumerate()
            .map(|(index, (id, name, arguments))| ToolCallDelta {
                index,
                id: Some(id.to_string()),
                name: Some(name.to_string()),
                arguments: Some(arguments.to_string()),
            })
            .collect();
        MockReply::Chunks(vec![LLMChunk::ToolCalls(deltas), LLMChunk::Done])
    }

    /// One call whose arguments arrive in `pieces` roughly equal fragments.
    pub fn streamed_tool_call(id: &str, name: &str, arguments: &str, pieces: usize) -> Self {
        let chars: Vec<char> = arguments.chars().collect();
        let size = chars.len().div_ceil(pieces.max(1)).max(1);

        let mut chunks = vec![LLMChunk::ToolCalls(vec![ToolCallDelta::start(0, id, name)])];
        chunks.extend(chars.chunks(size).map(|piece| {
            LLMChunk::ToolCalls(vec![ToolCallDelta::arguments(
                0,
                piece.iter().collect::<String>(),
            )])
        }));
        chunks.push(LLMChunk::Done);

        MockReply::Chunks(chunks)
    }

    /// Reports token usage just before the reply ends.
    pub fn with_usage(self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        let usage = LLMChunk::Usage {
            prompt_tokens,
            completion_tokens,
        };
        match self {
            MockReply::Chunks(mut chunks) => {
                let at = chunks
                    .iter()
                    .position(|chunk| *chunk == LLMChunk::Done)
                    .unwrap_or(chunks.len());
                chunks.insert(at, usage);
                MockReply::Chunks(chunks)
            }
            other => other,
        }
    }

    /// The first `count` chunks of this reply, after which it hangs.
    pub fn stall_after(self, count: usize) -> Self {
        match self {
            MockReply::Chunks(chunks) => {
                MockReply::StallAfter(chunks.into_iter().take(count).collect())
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub options: ChatOptions,
}

impl RecordedRequest {
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .map(|tool| tool.function.name.as_str())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MockLLMProvider {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockLLMProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.push(reply);
        self
    }

    pub fn push(&self, reply: MockReply) {
        lock(&self.replies).push_back(reply);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &ChatOptions,
    ) -> Result<LLMStream> {
        lock(&self.requests).push(RecordedRequest {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            options: options.clone(),
        });

        let reply = lock(&self.replies).pop_front();
        match reply {
            Some(MockReply::Chunks(chunks)) => Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok)))),
            Some(MockReply::Fail(message)) => Err(LLMError::Api(message)),
            Some(MockReply::Stall) => Ok(Box::pin(stream::pending())),
            Some(MockReply::StallAfter(chunks)) => Ok(Box::pin(
                stream::iter(chunks.into_iter().map(Ok)).chain(stream::pending()),
            )),
            None => Err(LLMError::Api("mock provider has no scripted reply left".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
