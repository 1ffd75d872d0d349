//! Streaming relay for chat completions.
//!
//! Consumes the upstream SSE stream to the end, hands each text token to
//! the caller's callback, and folds every chunk into an accumulator that
//! rebuilds the final completion for normalization. The relay never
//! returns early mid-stream, callback or not.

use std::collections::BTreeMap;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde_json::Map;

use crate::{
    error::AgentError,
    messages::{
        ChatChoice, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole,
        FunctionCall, ToolCall, Usage, function_call_type,
    },
};

pub(super) async fn relay(
    client: &Client,
    base_url: &str,
    api_key: &str,
    mut request: ChatCompletionRequest,
    token_callback: Option<&(dyn Fn(&str) + Send + Sync)>,
) -> crate::Result<ChatCompletionResponse> {
    request.stream = Some(true);

    let url = format!("{base_url}/chat/completions");

    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&request)
        .send()
        .await
        .map_err(|e| AgentError::ConnectionError(format!("Failed to send streaming chat completion request: {e}")))?;

    let status = response.status();

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        log::error!("Streaming chat completion API error ({status}): {error_text}");

        return Err(AgentError::from_status(status.as_u16(), error_text));
    }

    let mut events = std::pin::pin!(response.bytes_stream().eventsource());
    let mut accumulator = StreamAccumulator::default();

    while let Some(event) = events.next().await {
        let Ok(event) = event else {
            log::warn!("SSE parsing error in chat completion stream");
            continue;
        };

        if event.data == "[DONE]" {
            break;
        }

        let chunk: ChatCompletionChunk = match serde_json::from_str(&event.data) {
            Ok(chunk) => chunk,
            Err(_) => {
                log::warn!("Failed to parse streaming chat completion chunk");
                continue;
            }
        };

        if let Some(callback) = token_callback
            && let Some(token) = chunk.choices.first().and_then(|choice| choice.delta.content.as_deref())
            && !token.is_empty()
        {
            callback(token);
        }

        accumulator.apply(chunk);
    }

    accumulator
        .finish()
        .ok_or_else(|| AgentError::InternalError("Stream ended without producing a completion".to_string()))
}

/// Rebuilds the final completion from incremental chunks: content
/// concatenation, indexed tool-call assembly, last seen metadata.
#[derive(Default)]
struct StreamAccumulator {
    id: Option<String>,
    created: Option<u64>,
    model: Option<String>,
    role: Option<ChatRole>,
    content: Option<String>,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    saw_chunk: bool,
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl StreamAccumulator {
    fn apply(&mut self, chunk: ChatCompletionChunk) {
        self.saw_chunk = true;

        let ChatCompletionChunk {
            id,
            created,
            model,
            choices,
            usage,
        } = chunk;

        self.id.get_or_insert(id);
        self.created.get_or_insert(created);
        self.model.get_or_insert(model);

        if let Some(usage) = usage {
            self.usage = Some(usage);
        }

        // Only the first choice is interpreted, matching normalization.
        let Some(choice) = choices.into_iter().next() else {
            return;
        };

        if let Some(role) = choice.delta.role {
            self.role.get_or_insert(role);
        }

        if let Some(content) = choice.delta.content {
            self.content.get_or_insert_with(String::new).push_str(&content);
        }

        for delta in choice.delta.tool_calls.into_iter().flatten() {
            let entry = self.tool_calls.entry(delta.index).or_default();

            if let Some(id) = delta.id {
                entry.id = id;
            }

            if let Some(function) = delta.function {
                if let Some(name) = function.name {
                    entry.name = name;
                }

                if let Some(arguments) = function.arguments {
                    entry.arguments.push_str(&arguments);
                }
            }
        }

        if let Some(reason) = choice.finish_reason {
            self.finish_reason = Some(reason);
        }
    }

    fn finish(self) -> Option<ChatCompletionResponse> {
        if !self.saw_chunk {
            return None;
        }

        let tool_calls = if self.tool_calls.is_empty() {
            None
        } else {
            let calls = self
                .tool_calls
                .into_values()
                .map(|partial| ToolCall {
                    id: partial.id,
                    kind: function_call_type(),
                    function: FunctionCall {
                        name: partial.name,
                        arguments: partial.arguments,
                    },
                })
                .collect();

            Some(calls)
        };

        let message = ChatMessage {
            role: self.role.unwrap_or(ChatRole::Assistant),
            content: self.content,
            tool_calls,
            tool_call_id: None,
        };

        Some(ChatCompletionResponse {
            id: self.id.unwrap_or_default(),
            object: "chat.completion".to_string(),
            created: self.created.unwrap_or_default(),
            model: self.model.unwrap_or_default(),
            choices: vec![ChatChoice {
                index: 0,
                message,
                finish_reason: self.finish_reason,
                extra: Map::new(),
            }],
            usage: self.usage,
            extra: Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn chunk(body: serde_json::Value) -> ChatCompletionChunk {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn accumulates_content_across_chunks() {
        let mut accumulator = StreamAccumulator::default();

        accumulator.apply(chunk(json!({
            "id": "chatcmpl-1",
            "created": 1677651200,
            "model": "deepseek-chat",
            "choices": [{ "index": 0, "delta": { "role": "assistant", "content": "Hel" } }]
        })));

        accumulator.apply(chunk(json!({
            "id": "chatcmpl-1",
            "created": 1677651200,
            "model": "deepseek-chat",
            "choices": [{ "index": 0, "delta": { "content": "lo" }, "finish_reason": "stop" }]
        })));

        let response = accumulator.finish().unwrap();

        assert_eq!(response.id, "chatcmpl-1");
        assert_eq!(response.object, "chat.completion");

        let choice = &response.choices[0];
        assert_eq!(choice.message.content.as_deref(), Some("Hello"));
        assert_eq!(choice.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn assembles_tool_calls_from_indexed_deltas() {
        let mut accumulator = StreamAccumulator::default();

        accumulator.apply(chunk(json!({
            "id": "chatcmpl-2",
            "created": 1677651200,
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "delta": {
                    "role": "assistant",
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_1",
                        "function": { "name": "get_weather", "arguments": "{\"city\":" }
                    }]
                }
            }]
        })));

        accumulator.apply(chunk(json!({
            "id": "chatcmpl-2",
            "created": 1677651200,
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "delta": {
                    "tool_calls": [{ "index": 0, "function": { "arguments": "\"Tokyo\"}" } }]
                },
                "finish_reason": "tool_calls"
            }]
        })));

        let response = accumulator.finish().unwrap();
        let calls = response.choices[0].message.tool_calls.as_ref().unwrap();

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, "{\"city\":\"Tokyo\"}");

        // No content deltas arrived, so the assistant message has none.
        assert!(response.choices[0].message.content.is_none());
    }

    #[test]
    fn empty_stream_has_no_completion() {
        assert!(StreamAccumulator::default().finish().is_none());
    }
}
