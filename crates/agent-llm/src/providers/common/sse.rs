//! SSE response -> [`LLMStream`] adapter for OpenAI-compatible servers.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Response;

use crate::provider::{LLMError, LLMStream};
use crate::types::LLMChunk;

use super::openai_compat::parse_openai_compat_sse_data;

/// Decodes the `data:` payloads of an SSE body into chunks.
///
/// Blank payloads and empty deltas are skipped. The stream ends with a single
/// [`LLMChunk::Done`] on the `[DONE]` marker, or when the body ends. Parse
/// and transport failures surface as [`LLMError::Stream`].
pub fn llm_stream_from_sse(response: Response) -> LLMStream {
    let stream = response
        .bytes_stream()
        .eventsource()
        .filter_map(|event| async move {
            match event {
                Err(error) => Some(Err(LLMError::Stream(error.to_string()))),
                Ok(event) if event.data.trim().is_empty() => None,
                Ok(event) => parse_openai_compat_sse_data(&event.data)
                    .map_err(|error| LLMError::Stream(error.to_string()))
                    .transpose(),
            }
        })
        .scan(false, |done, item| {
            if *done {
                return futures::future::ready(None);
            }
            *done = matches!(item, Ok(LLMChunk::Done));
            futures::future::ready(Some(item))
        });

    Box::pin(stream)
}
