//! Chat completion adapter agent.
//!
//! Adapts an OpenAI-compatible chat completion endpoint into the normalized
//! response shape the host runtime consumes. One invocation performs exactly
//! one upstream call, streaming or not, with no retries and no state kept
//! across calls.

mod merge;
mod normalize;
mod stream;

pub use normalize::{NormalizedResponse, ToolArguments, ToolInvocation};

use std::{env, time::Duration};

use async_trait::async_trait;
use config::{API_KEY_ENV, ChatProviderConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use http::{HeaderMap, HeaderValue, header::CONNECTION};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::AgentError,
    messages::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage},
    runtime::{AgentFunction, Invocation},
};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Adapter around an OpenAI-compatible chat completion endpoint.
///
/// Defaults to the DeepSeek endpoint and model; every parameter can be
/// overridden per call through the invocation's params or inputs.
pub struct ChatCompletionAgent {
    client: Client,
    defaults: ChatProviderConfig,
}

/// Per-call settings, resolved once at entry with config < params < inputs
/// precedence. Camel-case keys match the host runtime's wire format.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatSettings {
    model: Option<String>,
    system: Option<String>,
    prompt: Option<String>,
    messages: Option<Vec<ChatMessage>>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    tools: Option<Value>,
    tool_choice: Option<Value>,
    response_format: Option<Value>,
    verbose: bool,
    stream: Option<bool>,
    #[serde(rename = "apiKey", alias = "api_key")]
    api_key: Option<String>,
    #[serde(rename = "baseURL", alias = "base_url")]
    base_url: Option<String>,
}

impl ChatCompletionAgent {
    pub fn new(defaults: ChatProviderConfig) -> crate::Result<Self> {
        let client = default_http_client_builder().build().map_err(|e| {
            log::error!("Failed to create HTTP client for chat completion agent: {e}");
            AgentError::InternalError("HTTP client initialization failed".to_string())
        })?;

        Ok(Self { client, defaults })
    }

    fn resolve_credential(&self, settings: &ChatSettings) -> crate::Result<String> {
        if let Some(key) = &settings.api_key {
            return Ok(key.clone());
        }

        if let Some(key) = &self.defaults.api_key {
            return Ok(key.expose_secret().to_string());
        }

        env::var(API_KEY_ENV).map_err(|_| AgentError::MissingApiKey)
    }

    async fn dispatch(
        &self,
        base_url: &str,
        api_key: &str,
        request: ChatCompletionRequest,
    ) -> crate::Result<ChatCompletionResponse> {
        let url = format!("{base_url}/chat/completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ConnectionError(format!("Failed to send chat completion request: {e}")))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Chat completion API error ({status}): {error_text}");

            return Err(AgentError::from_status(status.as_u16(), error_text));
        }

        let body = response.text().await.map_err(|e| {
            log::error!("Failed to read chat completion response body: {e}");
            AgentError::InternalError("Failed to read response body".to_string())
        })?;

        serde_json::from_str(&body).map_err(|e| {
            log::error!("Failed to parse chat completion response: {e}");
            AgentError::InternalError("Malformed chat completion response".to_string())
        })
    }
}

#[async_trait]
impl AgentFunction for ChatCompletionAgent {
    fn name(&self) -> &'static str {
        "chatCompletionAgent"
    }

    async fn invoke(&self, invocation: Invocation) -> crate::Result<Value> {
        let mut settings: ChatSettings = invocation.resolve()?;

        let user_prompt = merge::merge_value(
            &invocation.params,
            &invocation.inputs,
            "mergeablePrompts",
            settings.prompt.as_deref(),
        );

        let system_prompt = merge::merge_value(
            &invocation.params,
            &invocation.inputs,
            "mergeableSystem",
            settings.system.as_deref(),
        );

        let mut messages = assemble_messages(system_prompt.as_deref(), settings.messages.take());

        if let Some(prompt) = user_prompt {
            messages.push(ChatMessage::user(prompt));
        }

        if settings.verbose
            && let Ok(json) = serde_json::to_string(&messages)
        {
            log::debug!("Dispatching {} messages: {json}", messages.len());
        }

        let api_key = self.resolve_credential(&settings)?;

        let base_url = settings
            .base_url
            .as_deref()
            .or(self.defaults.base_url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let model = settings
            .model
            .take()
            .or_else(|| self.defaults.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let streaming = settings.stream.or(self.defaults.stream).unwrap_or(false);

        let request = ChatCompletionRequest {
            model,
            messages: messages.clone(),
            temperature: Some(settings.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            max_tokens: Some(settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            tools: settings.tools,
            tool_choice: settings.tool_choice,
            response_format: settings.response_format,
            stream: None,
        };

        let response = if streaming {
            stream::relay(
                &self.client,
                &base_url,
                &api_key,
                request,
                invocation.token_callback.as_deref(),
            )
            .await?
        } else {
            self.dispatch(&base_url, &api_key, request).await?
        };

        let normalized = normalize::normalize(response, messages);

        serde_json::to_value(&normalized)
            .map_err(|e| AgentError::InternalError(format!("Failed to serialize normalized response: {e}")))
    }
}

/// Start from the prior sequence, or seed a fresh one with the system
/// prompt when no prior sequence exists. No role-ordering validation.
fn assemble_messages(system: Option<&str>, prior: Option<Vec<ChatMessage>>) -> Vec<ChatMessage> {
    match prior {
        Some(messages) => messages,
        None => match system {
            Some(text) => vec![ChatMessage::system(text)],
            None => Vec::new(),
        },
    }
}

fn default_http_client_builder() -> reqwest::ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    Client::builder()
        .timeout(Duration::from_secs(60))
        // Short idle timeout so pooled connections pick up DNS changes.
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
}
