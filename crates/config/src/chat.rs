//! Defaults for the chat completion agent.

use secrecy::SecretString;
use serde::Deserialize;

/// Endpoint used when neither the call nor the configuration overrides it.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";

/// Model used when neither the call nor the configuration overrides it.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

/// Chat provider defaults. Every field is optional; per-call parameters
/// always take precedence over these values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatProviderConfig {
    /// API key for authentication.
    pub api_key: Option<SecretString>,

    /// Custom base URL for the provider API.
    pub base_url: Option<String>,

    /// Model sent to the provider when the call does not name one.
    pub model: Option<String>,

    /// Whether calls stream by default.
    pub stream: Option<bool>,
}
