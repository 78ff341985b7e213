use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use agent_core::tools::{
    normalize_tool_name, parse_tool_args, ToolCall, ToolError, ToolRegistry, ToolSchema,
};
use agent_core::{AgentError, AgentEvent, Conversation, Message};
use agent_llm::{ChatOptions, LLMProvider, LLMStream, TokenUsage, ToolChoice};
use agent_structured::{debounce, DecodeStep, IncrementalDecoder, ResultSchema, FINAL_RESULT_TOOL};

use crate::config::AgentLoopConfig;
use crate::dispatch::{dispatch_tool_calls, ToolOutcome};
use crate::retry::RetryBudget;
use crate::sink::PresentationSink;
use crate::stream::{consume_llm_stream, structured_fragments, StreamHandlingOutput, StructuredChunk};

pub type Result<T> = std::result::Result<T, AgentError>;

/// Corrective message for a plain-text reply to a structured request.
pub const PLAIN_TEXT_NOT_PERMITTED: &str =
    "Plain text responses are not permitted, please call one of the functions instead.";
/// Tool-result content acknowledging an accepted structured result.
pub const FINAL_RESULT_PROCESSED: &str = "Final result processed.";
/// Tool-result content for calls skipped because a result was accepted.
pub const TOOL_NOT_EXECUTED: &str = "Tool not executed - a final result was already processed.";

/// The value a run produced and the history that led to it.
#[derive(Debug, Clone)]
pub struct RunOutcome<T> {
    pub output: T,
    pub conversation: Conversation,
    /// Tokens the provider reported across every request of the run.
    pub usage: TokenUsage,
}

/// What a structured reply's `final_result` call amounted to.
enum FinalVerdict {
    Absent,
    Accepted(Value),
    Rejected(String),
}

/// Drives the model, the tools and the retry budget for one request at a time.
///
/// `D` is the dependency bundle handed to tools. The agent only borrows it
/// for the duration of a run.
pub struct Agent<D>
where
    D: Send + Sync + 'static,
{
    llm: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry<D>>,
    config: AgentLoopConfig,
}

impl<D> Agent<D>
where
    D: Send + Sync + 'static,
{
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        registry: Arc<ToolRegistry<D>>,
        config: AgentLoopConfig,
    ) -> Self {
        Self {
            llm,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    pub fn start_conversation(&self, prompt: impl Into<String>) -> Conversation {
        Conversation::start(self.config.system_prompt.as_deref(), prompt)
    }

    /// Runs until the model answers in plain text.
    pub async fn run(
        &self,
        prompt: impl Into<String>,
        deps: &D,
        cancel_token: &CancellationToken,
    ) -> Result<RunOutcome<String>> {
        let mut conversation = self.start_conversation(prompt);
        let (output, usage) = self
            .run_conversation(&mut conversation, deps, cancel_token)
            .await?;
        Ok(RunOutcome {
            output,
            conversation,
            usage,
        })
    }

    /// Like [`run`](Self::run), on a conversation the caller keeps hold of.
    pub async fn run_conversation(
        &self,
        conversation: &mut Conversation,
        deps: &D,
        cancel_token: &CancellationToken,
    ) -> Result<(String, TokenUsage)> {
        let mut usage = TokenUsage::default();
        let result = self
            .text_rounds(conversation, deps, &mut usage, cancel_token)
            .await;
        self.finish(conversation, usage, result).await
    }

    /// Runs until the model calls `final_result` with arguments that pass
    /// strict validation against `schema`.
    pub async fn run_structured(
        &self,
        prompt: impl Into<String>,
        schema: &ResultSchema,
        deps: &D,
        cancel_token: &CancellationToken,
    ) -> Result<RunOutcome<Value>> {
        let mut conversation = self.start_conversation(prompt);
        let (output, usage) = self
            .run_structured_conversation(&mut conversation, schema, deps, cancel_token)
            .await?;
        Ok(RunOutcome {
            output,
            conversation,
            usage,
        })
    }

    pub async fn run_structured_conversation(
        &self,
        conversation: &mut Conversation,
        schema: &ResultSchema,
        deps: &D,
        cancel_token: &CancellationToken,
    ) -> Result<(Value, TokenUsage)> {
        let mut usage = TokenUsage::default();
        let result = self
            .structured_rounds(conversation, schema, deps, None, &mut usage, cancel_token)
            .await;
        self.finish(conversation, usage, result).await
    }

    /// Structured run whose result is shown to `sink` while it streams.
    ///
    /// Intermediate views pass partial validation; a final payload that
    /// fails strict validation ends the run.
    pub async fn run_stream_structured<S>(
        &self,
        prompt: impl Into<String>,
        schema: &ResultSchema,
        deps: &D,
        sink: &mut S,
        cancel_token: &CancellationToken,
    ) -> Result<RunOutcome<Value>>
    where
        S: PresentationSink,
    {
        let mut conversation = self.start_conversation(prompt);
        let (output, usage) = self
            .run_stream_structured_conversation(&mut conversation, schema, deps, sink, cancel_token)
            .await?;
        Ok(RunOutcome {
            output,
            conversation,
            usage,
        })
    }

    pub async fn run_stream_structured_conversation<S>(
        &self,
        conversation: &mut Conversation,
        schema: &ResultSchema,
        deps: &D,
        sink: &mut S,
        cancel_token: &CancellationToken,
    ) -> Result<(Value, TokenUsage)>
    where
        S: PresentationSink,
    {
        let sink: &mut dyn PresentationSink = sink;
        let mut usage = TokenUsage::default();
        let result = self
            .structured_rounds(conversation, schema, deps, Some(sink), &mut usage, cancel_token)
            .await;
        self.finish(conversation, usage, result).await
    }

    async fn text_rounds(
        &self,
        conversation: &mut Conversation,
        deps: &D,
        usage: &mut TokenUsage,
        cancel_token: &CancellationToken,
    ) -> Result<String> {
        let mut budget = RetryBudget::new(self.config.max_retries);
        let tools = self.registry.list_tools();
        let options = self.chat_options(ToolChoice::Auto);

        log::debug!(
            "[{}] Starting run with {} tools, max_retries={}",
            conversation.id,
            tools.len(),
            self.config.max_retries
        );

        for round in 1..=self.config.max_rounds {
            let timer = Timer::new(format!("round_{round}"));
            let stream = self
                .open_stream(conversation, &tools, &options, cancel_token)
                .await?;
            let output = consume_llm_stream(stream, cancel_token, &conversation.id).await?;
            timer.debug(&conversation.id);
            usage.add(&output.usage);

            if !output.has_tool_calls() {
                log::info!(
                    "[{}] Final answer after {} round(s), {} retries",
                    conversation.id,
                    round,
                    conversation.retry_count()
                );
                conversation.add_message(Message::assistant(output.content.clone(), None));
                self.config.emit(AgentEvent::Complete { rounds: round }).await;
                return Ok(output.content);
            }

            conversation.add_message(Message::assistant(
                output.content,
                Some(output.tool_calls.clone()),
            ));
            let outcomes = self
                .run_tools(&output.tool_calls, deps, cancel_token)
                .await?;
            self.apply_tool_outcomes(conversation, &output.tool_calls, outcomes, &mut budget)
                .await?;
        }

        Err(AgentError::RoundLimitExceeded(self.config.max_rounds))
    }

    async fn structured_rounds(
        &self,
        conversation: &mut Conversation,
        schema: &ResultSchema,
        deps: &D,
        mut sink: Option<&mut dyn PresentationSink>,
        usage: &mut TokenUsage,
        cancel_token: &CancellationToken,
    ) -> Result<Value> {
        schema
            .check()
            .map_err(|error| AgentError::ContractViolation(error.to_string()))?;

        let mut budget = RetryBudget::new(self.config.max_retries);
        let mut tools = self.registry.list_tools();
        tools.push(ToolSchema::function(
            schema.tool_name(),
            schema.tool_description(),
            schema.tool_parameters(),
        ));
        let options = self.chat_options(ToolChoice::Required);

        for round in 1..=self.config.max_rounds {
            let timer = Timer::new(format!("round_{round}"));
            let stream = self
                .open_stream(conversation, &tools, &options, cancel_token)
                .await?;
            let (output, verdict) = match sink.as_deref_mut() {
                Some(sink) => {
                    self.decode_streaming(stream, schema, sink, &conversation.id, cancel_token)
                        .await?
                }
                None => {
                    let output = consume_llm_stream(stream, cancel_token, &conversation.id).await?;
                    let verdict = check_final_result(schema, &output.tool_calls);
                    (output, verdict)
                }
            };
            timer.debug(&conversation.id);
            usage.add(&output.usage);

            if !output.has_tool_calls() {
                conversation.add_message(Message::assistant(output.content, None));
                log::info!(
                    "[{}] Plain text reply to a structured request, asking again",
                    conversation.id
                );
                budget.consume(FINAL_RESULT_TOOL, PLAIN_TEXT_NOT_PERMITTED)?;
                conversation.add_message(Message::user_retry_prompt(PLAIN_TEXT_NOT_PERMITTED));
                continue;
            }

            let calls = output.tool_calls;
            conversation.add_message(Message::assistant(output.content, Some(calls.clone())));

            let rejection = match verdict {
                FinalVerdict::Accepted(value) => {
                    for call in &calls {
                        let content = if call.function.name == FINAL_RESULT_TOOL {
                            FINAL_RESULT_PROCESSED
                        } else {
                            TOOL_NOT_EXECUTED
                        };
                        conversation.add_message(Message::tool_result(call.id.clone(), content));
                    }
                    log::info!(
                        "[{}] Structured result accepted after {} round(s), {} retries",
                        conversation.id,
                        round,
                        conversation.retry_count()
                    );
                    self.config.emit(AgentEvent::Complete { rounds: round }).await;
                    return Ok(value);
                }
                FinalVerdict::Rejected(reason) => Some(reason),
                FinalVerdict::Absent => None,
            };

            let (result_calls, tool_calls): (Vec<ToolCall>, Vec<ToolCall>) = calls
                .iter()
                .cloned()
                .partition(|call| call.function.name == FINAL_RESULT_TOOL);
            let mut dispatched = self
                .run_tools(&tool_calls, deps, cancel_token)
                .await?
                .into_iter();

            let outcomes = calls
                .iter()
                .map(|call| {
                    if call.function.name == FINAL_RESULT_TOOL {
                        let reason = rejection.clone().unwrap_or_default();
                        Err(ToolError::Retry(reason))
                    } else {
                        dispatched.next().unwrap_or_else(|| {
                            Err(ToolError::Execution("tool outcome missing".to_string()))
                        })
                    }
                })
                .collect();
            log::debug!(
                "[{}] {} result call(s) rejected, {} tool call(s) run",
                conversation.id,
                result_calls.len(),
                tool_calls.len()
            );

            self.apply_tool_outcomes(conversation, &calls, outcomes, &mut budget)
                .await?;
        }

        Err(AgentError::RoundLimitExceeded(self.config.max_rounds))
    }

    /// Feeds the result tool's arguments through the debounce stage and the
    /// decoder while the reply streams. Decoding failures are fatal.
    async fn decode_streaming(
        &self,
        stream: LLMStream,
        schema: &ResultSchema,
        sink: &mut dyn PresentationSink,
        conversation_id: &str,
        cancel_token: &CancellationToken,
    ) -> Result<(StreamHandlingOutput, FinalVerdict)> {
        let mut decoder = IncrementalDecoder::new(schema.clone());
        let chunks = debounce(
            structured_fragments(stream, FINAL_RESULT_TOOL),
            self.config.debounce,
            |item: &Result<StructuredChunk>| {
                item.as_ref().is_ok_and(StructuredChunk::is_coalescible)
            },
        );
        let mut chunks = Box::pin(chunks);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
                next = chunks.next() => next,
            };

            match next {
                Some(Ok(StructuredChunk::Fragment { text, is_final })) => {
                    let step = decoder.feed(&text, is_final).map_err(|error| {
                        log::warn!("[{}] {}", conversation_id, error);
                        AgentError::ContractViolation(error.to_string())
                    })?;
                    if let DecodeStep::Emit(view) = step {
                        sink.render(&view, is_final);
                        self.config
                            .emit(AgentEvent::StructuredUpdate { view, is_final })
                            .await;
                    }
                }
                Some(Ok(StructuredChunk::Finished(output))) => {
                    log::debug!(
                        "[{}] Structured stream finished after {} fragments",
                        conversation_id,
                        decoder.fragments_seen()
                    );
                    let verdict = match decoder.last_view() {
                        Some(view) if decoder.is_finished() => FinalVerdict::Accepted(view.clone()),
                        _ => FinalVerdict::Absent,
                    };
                    return Ok((output, verdict));
                }
                Some(Err(error)) => return Err(error),
                None => {
                    return Err(AgentError::LLM(
                        "structured stream ended without a reply".to_string(),
                    ))
                }
            }
        }
    }

    async fn open_stream(
        &self,
        conversation: &Conversation,
        tools: &[ToolSchema],
        options: &ChatOptions,
        cancel_token: &CancellationToken,
    ) -> Result<LLMStream> {
        if cancel_token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        log::debug!(
            "[{}] Requesting {} with {} messages",
            conversation.id,
            self.llm.model_name(),
            conversation.len()
        );

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => Err(AgentError::Cancelled),
            stream = self.llm.chat_stream(conversation.messages(), tools, options) => {
                stream.map_err(|error| AgentError::LLM(error.to_string()))
            }
        }
    }

    async fn run_tools(
        &self,
        calls: &[ToolCall],
        deps: &D,
        cancel_token: &CancellationToken,
    ) -> Result<Vec<ToolOutcome>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        for call in calls {
            self.config
                .emit(AgentEvent::ToolStart {
                    tool_call_id: call.id.clone(),
                    tool_name: call.function.name.clone(),
                    arguments: parse_tool_args(&call.function.arguments)
                        .unwrap_or_else(|_| Value::String(call.function.arguments.clone())),
                })
                .await;
        }

        let timer = Timer::new(format!("{} tool call(s)", calls.len()));
        let outcomes = dispatch_tool_calls(
            &self.registry,
            calls,
            deps,
            self.config.tool_dispatch,
            cancel_token,
        )
        .await?;
        timer.debug("tools");
        Ok(outcomes)
    }

    /// Appends one tool-result turn per call, in request order.
    ///
    /// Retryable failures become corrective messages and draw on the
    /// failing tool's share of `budget`; a success resets that share.
    /// Anything else ends the run.
    async fn apply_tool_outcomes(
        &self,
        conversation: &mut Conversation,
        calls: &[ToolCall],
        outcomes: Vec<ToolOutcome>,
        budget: &mut RetryBudget,
    ) -> Result<()> {
        for (call, outcome) in calls.iter().zip(outcomes) {
            let tool_name = call.function.name.as_str();
            match outcome {
                Ok(output) => {
                    budget.reset(normalize_tool_name(tool_name));
                    conversation.add_message(Message::tool_result(
                        call.id.clone(),
                        output.to_message_content(),
                    ));
                    self.config
                        .emit(AgentEvent::ToolComplete {
                            tool_call_id: call.id.clone(),
                            tool_name: tool_name.to_string(),
                        })
                        .await;
                }
                Err(error) if self.config.is_retryable(&error) => {
                    let reason = error.to_string();
                    let key = normalize_tool_name(tool_name);
                    budget.consume(key, &reason)?;
                    log::info!(
                        "[{}] Tool '{}' asked for a retry ({}/{}): {}",
                        conversation.id,
                        tool_name,
                        budget.used(key),
                        budget.max(),
                        reason
                    );
                    conversation.add_message(Message::retry_prompt(call.id.clone(), &reason));
                    self.config
                        .emit(AgentEvent::ToolRetry {
                            tool_call_id: call.id.clone(),
                            tool_name: tool_name.to_string(),
                            reason,
                        })
                        .await;
                }
                Err(error) => {
                    log::warn!(
                        "[{}] Tool '{}' failed: {}",
                        conversation.id,
                        tool_name,
                        error
                    );
                    self.config
                        .emit(AgentEvent::ToolError {
                            tool_call_id: call.id.clone(),
                            error: error.to_string(),
                        })
                        .await;
                    return Err(AgentError::from_tool_error(tool_name, error));
                }
            }
        }
        Ok(())
    }

    fn chat_options(&self, tool_choice: ToolChoice) -> ChatOptions {
        ChatOptions {
            max_output_tokens: self.config.max_output_tokens,
            tool_choice,
        }
    }

    async fn finish<T>(
        &self,
        conversation: &Conversation,
        usage: TokenUsage,
        result: Result<T>,
    ) -> Result<(T, TokenUsage)> {
        log::debug!("[{}] Token usage: {}", conversation.id, usage);
        if let Err(error) = &result {
            log::warn!("[{}] Run failed: {}", conversation.id, error);
            DebugLogger::new(log::log_enabled!(log::Level::Debug)).log_event(
                &conversation.id,
                "run_failed",
                serde_json::json!({
                    "error": error.to_string(),
                    "messages": conversation.len(),
                    "retries": conversation.retry_count(),
                    "total_tokens": usage.total_tokens(),
                }),
            );
            self.config
                .emit(AgentEvent::Error {
                    message: error.to_string(),
                })
                .await;
        }
        result.map(|output| (output, usage))
    }
}

/// Parses and strictly validates the first `final_result` call, if any.
fn check_final_result(schema: &ResultSchema, calls: &[ToolCall]) -> FinalVerdict {
    let Some(call) = calls
        .iter()
        .find(|call| call.function.name == FINAL_RESULT_TOOL)
    else {
        return FinalVerdict::Absent;
    };

    let mut decoder = IncrementalDecoder::new(schema.clone());
    match decoder.feed(&call.function.arguments, true) {
        Ok(DecodeStep::Emit(view)) => FinalVerdict::Accepted(view),
        Ok(_) => FinalVerdict::Rejected("structured output was empty".to_string()),
        Err(error) => FinalVerdict::Rejected(error.to_string()),
    }
}

struct DebugLogger {
    enabled: bool,
}

impl DebugLogger {
    fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn log_event(&self, conversation_id: &str, event_type: &str, details: Value) {
        if !self.enabled {
            return;
        }

        log::debug!("[{}] {}: {}", conversation_id, event_type, details);
    }
}

struct Timer {
    name: String,
    start: std::time::Instant,
}

impl Timer {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: std::time::Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    fn debug(&self, conversation_id: &str) {
        log::debug!(
            "[{}] {} completed in {}ms",
            conversation_id,
            self.name,
            self.elapsed_ms()
        );
    }
}
