//! Configuration for the agent function library.

mod chat;
mod loader;
mod options;

pub use chat::{API_KEY_ENV, ChatProviderConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use loader::{from_str, load};
pub use options::LlmOption;

use serde::Deserialize;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Defaults applied by the chat completion agent when a call does not
    /// override them.
    pub chat: ChatProviderConfig,

    /// The fixed list of LLM configurations the selection agent partitions.
    pub llm_options: Vec<LlmOption>,
}
