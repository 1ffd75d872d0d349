//! Wire types for the OpenAI-compatible chat completion protocol.
//!
//! Unknown response fields are preserved through flattened maps so the
//! normalized result carries everything the upstream service returned.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
    /// Catch-all for roles this crate does not interpret.
    #[serde(untagged)]
    Other(String),
}

/// One entry of the conversation sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A tool call as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,

    #[serde(rename = "type", default = "function_call_type")]
    pub kind: String,

    pub function: FunctionCall,
}

pub(crate) fn function_call_type() -> String {
    "function".to_string()
}

/// Function name and raw argument payload of a tool call.
///
/// Arguments stay a raw JSON string here; parsing happens during
/// normalization where failures are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Outbound chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,

    pub messages: Vec<ChatMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tool definitions, passed through verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Full (non-streaming) chat completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,

    #[serde(default)]
    pub object: String,

    #[serde(default)]
    pub created: u64,

    #[serde(default)]
    pub model: String,

    pub choices: Vec<ChatChoice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One choice of a completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,

    pub message: ChatMessage,

    #[serde(default)]
    pub finish_reason: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Token accounting reported by the upstream service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One incremental event of a streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,

    #[serde(default)]
    pub created: u64,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,

    pub delta: MessageDelta,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental piece of the assistant message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub role: Option<ChatRole>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Indexed fragment of a streamed tool call. The id and name arrive on the
/// first fragment for an index; argument text accumulates across fragments.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,

    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub arguments: Option<String>,
}
