//! OpenAI-compatible request serialization and stream chunk parsing.
//!
//! The JSON body never carries internal `agent_core::Message` fields such as
//! `id`, `retry` or `created_at`.

use agent_core::{agent::Role, tools::ToolSchema, Message, ToolCallDelta};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::{ChatOptions, Result};
use crate::types::LLMChunk;

fn role_name(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

pub fn messages_to_openai_compat_json(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = json!({
                "role": role_name(&m.role),
                "content": m.content,
            });

            if let Some(tool_call_id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(tool_call_id);
            }

            if let Some(tool_calls) = m.tool_calls.as_ref().filter(|calls| !calls.is_empty()) {
                msg["tool_calls"] = json!(tool_calls);
            }

            msg
        })
        .collect()
}

/// Builds a streaming chat completion body.
///
/// `tools` and `tool_choice` are left out entirely when no tool is offered,
/// since compatible servers reject an empty `tools` array.
pub fn build_openai_compat_body(
    model: &str,
    messages: &[Message],
    tools: &[ToolSchema],
    options: &ChatOptions,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages_to_openai_compat_json(messages),
        "stream": true,
        "stream_options": { "include_usage": true },
    });

    if !tools.is_empty() {
        body["tools"] = json!(tools);
        body["tool_choice"] = json!(options.tool_choice.as_str());
    }

    if let Some(max_tokens) = options.max_output_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    body
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

/// Parses one SSE `data:` payload.
///
/// - `"[DONE]"` -> `Some(LLMChunk::Done)`
/// - the trailing `usage` chunk -> `Some(LLMChunk::Usage { .. })`
/// - a chunk with neither text, tool calls nor usage -> `None`
/// - invalid JSON -> error
pub fn parse_openai_compat_sse_data(data: &str) -> Result<Option<LLMChunk>> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Some(LLMChunk::Done));
    }

    let chunk: StreamChunk = serde_json::from_str(data)?;
    let usage = chunk.usage.map(|usage| LLMChunk::Usage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
    });
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(usage);
    };

    if let Some(calls) = choice.delta.tool_calls.filter(|calls| !calls.is_empty()) {
        let deltas = calls
            .into_iter()
            .map(|call| {
                let (name, arguments) = call
                    .function
                    .map(|function| (function.name, function.arguments))
                    .unwrap_or_default();
                ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name,
                    arguments,
                }
            })
            .collect();
        return Ok(Some(LLMChunk::ToolCalls(deltas)));
    }

    Ok(choice
        .delta
        .content
        .filter(|content| !content.is_empty())
        .map(LLMChunk::Token)
        .or(usage))
}
