use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use agent_core::tools::{ToolCall, ToolCallAccumulator};
use agent_core::AgentError;
use agent_llm::{LLMChunk, LLMStream, TokenUsage};

/// Everything one model reply produced.
#[derive(Debug, Clone, Default)]
pub struct StreamHandlingOutput {
    pub content: String,
    /// Provider-reported tokens for this one request.
    pub usage: TokenUsage,
    pub tool_calls: Vec<ToolCall>,
}

impl StreamHandlingOutput {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Drains a provider stream into text and reassembled tool calls.
///
/// Every wait on the stream is raced against `cancel_token`.
pub async fn consume_llm_stream(
    mut stream: LLMStream,
    cancel_token: &CancellationToken,
    conversation_id: &str,
) -> Result<StreamHandlingOutput, AgentError> {
    let mut content = String::new();
    let mut usage = TokenUsage {
        requests: 1,
        ..TokenUsage::default()
    };
    let mut tool_calls = ToolCallAccumulator::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
            next = stream.next() => next,
        };

        match next {
            None | Some(Ok(LLMChunk::Done)) => {
                log::debug!("[{}] LLM stream completed", conversation_id);
                break;
            }
            Some(Ok(LLMChunk::Token(token))) => {
                log::trace!("[{}] token: {}", conversation_id, token);
                content.push_str(&token);
            }
            Some(Ok(LLMChunk::Usage {
                prompt_tokens,
                completion_tokens,
            })) => {
                usage.prompt_tokens += prompt_tokens;
                usage.completion_tokens += completion_tokens;
            }
            Some(Ok(LLMChunk::ToolCalls(deltas))) => {
                log::debug!(
                    "[{}] Received {} tool call parts",
                    conversation_id,
                    deltas.len()
                );
                tool_calls.extend(&deltas);
            }
            Some(Err(error)) => {
                log::warn!("[{}] Stream error: {}", conversation_id, error);
                return Err(AgentError::LLM(error.to_string()));
            }
        }
    }

    Ok(StreamHandlingOutput {
        content,
        usage,
        tool_calls: tool_calls.finalize(),
    })
}
