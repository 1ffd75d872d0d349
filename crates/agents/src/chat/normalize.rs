//! Normalization of chat completion responses.

use serde::Serialize;
use serde_json::Value;

use crate::messages::{ChatCompletionResponse, ChatMessage, ToolCall};

/// Arguments of a derived tool call: either the parsed payload or an
/// explicit marker that the payload did not parse. The marker serializes
/// as an absent field, so callers can distinguish "no arguments" (missing
/// tool call) from "malformed arguments" (tool call present, field gone).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolArguments {
    Parsed(Value),
    Unparseable,
}

impl ToolArguments {
    pub fn is_unparseable(&self) -> bool {
        matches!(self, Self::Unparseable)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Unparseable => None,
        }
    }
}

/// A tool call derived from the raw response, with its arguments parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,

    #[serde(skip_serializing_if = "ToolArguments::is_unparseable")]
    pub arguments: ToolArguments,
}

impl ToolInvocation {
    fn from_wire(tool_call: &ToolCall) -> Self {
        let arguments = match serde_json::from_str(&tool_call.function.arguments) {
            Ok(value) => ToolArguments::Parsed(value),
            Err(e) => {
                log::warn!(
                    "Failed to parse arguments of tool call '{}': {e}",
                    tool_call.function.name
                );

                ToolArguments::Unparseable
            }
        };

        Self {
            id: tool_call.id.clone(),
            name: tool_call.function.name.clone(),
            arguments,
        }
    }
}

/// The raw upstream response flattened together with the derived fields.
#[derive(Debug, Serialize)]
pub struct NormalizedResponse {
    #[serde(flatten)]
    pub response: ChatCompletionResponse,

    /// First choice's text content, or null.
    pub text: Option<String>,

    /// First derived tool call, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolInvocation>,

    /// All derived tool calls, possibly empty.
    pub tool_calls: Vec<ToolInvocation>,

    /// Normalized copy of the first choice's message, or null.
    pub message: Option<ChatMessage>,

    /// The full message sequence including the new assistant turn.
    pub messages: Vec<ChatMessage>,
}

/// Derive the convenience fields from the first choice and append the new
/// assistant turn to the message sequence. Only choice index 0 is
/// interpreted; further choices survive untouched inside the raw response.
pub(super) fn normalize(response: ChatCompletionResponse, mut messages: Vec<ChatMessage>) -> NormalizedResponse {
    let new_message = response.choices.first().map(|choice| choice.message.clone());

    let text = new_message.as_ref().and_then(|message| message.content.clone());

    let raw_tool_calls = new_message
        .as_ref()
        .and_then(|message| message.tool_calls.clone())
        .unwrap_or_default();

    let tool_calls: Vec<ToolInvocation> = raw_tool_calls.iter().map(ToolInvocation::from_wire).collect();
    let tool = tool_calls.first().cloned();

    let message = new_message.map(|message| ChatMessage {
        role: message.role,
        content: message.content,
        tool_calls: message.tool_calls.filter(|calls| !calls.is_empty()),
        tool_call_id: None,
    });

    if let Some(message) = &message {
        messages.push(message.clone());
    }

    NormalizedResponse {
        response,
        text,
        tool,
        tool_calls,
        message,
        messages,
    }
}
