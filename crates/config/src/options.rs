//! Entries of the fixed LLM selection list.

use serde::{Deserialize, Serialize};

/// One selectable LLM configuration.
///
/// Serialized with the camel-case keys the host runtime uses on the wire;
/// snake-case aliases are accepted so the same shape reads naturally from
/// TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LlmOption {
    /// Name the selection agent matches against.
    pub name: String,

    /// Agent function that talks to this LLM.
    #[serde(alias = "agent_name")]
    pub agent_name: String,

    /// Model identifier passed through to that agent.
    pub model: String,

    /// Optional per-option credential.
    #[serde(default, alias = "api_key", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}
