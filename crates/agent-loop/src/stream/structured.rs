use futures::{Stream, StreamExt};

use agent_core::tools::ToolCallAccumulator;
use agent_core::AgentError;
use agent_llm::{LLMChunk, LLMStream, TokenUsage};

use super::handler::StreamHandlingOutput;

#[derive(Debug, Clone)]
pub enum StructuredChunk {
    /// Arguments of the result tool received so far. Only the final fragment
    /// is guaranteed to be complete JSON.
    Fragment { text: String, is_final: bool },
    /// The reply ended; carries what it produced.
    Finished(StreamHandlingOutput),
}

impl StructuredChunk {
    /// Intermediate fragments may be dropped in favour of a newer one.
    pub fn is_coalescible(&self) -> bool {
        matches!(self, StructuredChunk::Fragment { is_final: false, .. })
    }
}

/// Follows the arguments of `result_tool` while a reply streams.
///
/// A fragment is yielded each time the arguments grow, then once more with
/// `is_final` when the reply ends, then [`StructuredChunk::Finished`]. A
/// reply that never calls `result_tool` yields only `Finished`.
pub fn structured_fragments(
    mut stream: LLMStream,
    result_tool: &'static str,
) -> impl Stream<Item = Result<StructuredChunk, AgentError>> + Send + 'static {
    async_stream::try_stream! {
        let mut content = String::new();
        let mut usage = TokenUsage {
            requests: 1,
            ..TokenUsage::default()
        };
        let mut accumulator = ToolCallAccumulator::new();
        let mut seen = 0usize;

        while let Some(chunk) = stream.next().await {
            match chunk.map_err(|error| AgentError::LLM(error.to_string()))? {
                LLMChunk::Token(token) => content.push_str(&token),
                LLMChunk::Usage { prompt_tokens, completion_tokens } => {
                    usage.prompt_tokens += prompt_tokens;
                    usage.completion_tokens += completion_tokens;
                }
                LLMChunk::ToolCalls(deltas) => {
                    accumulator.extend(&deltas);
                    if let Some(arguments) = accumulator.arguments_of(result_tool) {
                        if arguments.len() > seen {
                            seen = arguments.len();
                            yield StructuredChunk::Fragment {
                                text: arguments.to_string(),
                                is_final: false,
                            };
                        }
                    }
                }
                LLMChunk::Done => break,
            }
        }

        let tool_calls = accumulator.finalize();
        if let Some(call) = tool_calls.iter().find(|call| call.function.name == result_tool) {
            yield StructuredChunk::Fragment {
                text: call.function.arguments.clone(),
                is_final: true,
            };
        }

        yield StructuredChunk::Finished(StreamHandlingOutput {
            content,
            usage,
            tool_calls,
        });
    }
}
