//! LLM option selection agent.

use async_trait::async_trait;
use config::LlmOption;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::AgentError,
    runtime::{AgentFunction, Invocation},
};

/// Picks the configuration matching the selected name and hands the first
/// two remaining options to the fixed reviewer slots.
pub struct SelectLlmAgent;

#[derive(Debug, Deserialize)]
struct SelectLlmInputs {
    #[serde(rename = "llmOptions")]
    llm_options: Vec<LlmOption>,

    #[serde(rename = "selectedLLMName")]
    selected_llm_name: String,
}

/// The option list partitioned around the selected name. `selectedLLM` is
/// null when no option matches; the reviewer slots are absent when fewer
/// than two alternatives exist.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct LlmSelection {
    #[serde(rename = "selectedLLM")]
    pub selected: Option<LlmOption>,

    #[serde(rename = "proofreadLLM_A", skip_serializing_if = "Option::is_none")]
    pub reviewer_a: Option<LlmOption>,

    #[serde(rename = "proofreadLLM_B", skip_serializing_if = "Option::is_none")]
    pub reviewer_b: Option<LlmOption>,
}

/// Partition `options` around `name`.
pub fn select_llm(options: &[LlmOption], name: &str) -> LlmSelection {
    let selected = options.iter().find(|option| option.name == name).cloned();

    let mut remaining = options.iter().filter(|option| option.name != name);

    LlmSelection {
        selected,
        reviewer_a: remaining.next().cloned(),
        reviewer_b: remaining.next().cloned(),
    }
}

#[async_trait]
impl AgentFunction for SelectLlmAgent {
    fn name(&self) -> &'static str {
        "selectLLMAgent"
    }

    async fn invoke(&self, invocation: Invocation) -> crate::Result<Value> {
        let inputs: SelectLlmInputs = invocation.resolve()?;

        let selection = select_llm(&inputs.llm_options, &inputs.selected_llm_name);

        serde_json::to_value(&selection)
            .map_err(|e| AgentError::InternalError(format!("Failed to serialize selection: {e}")))
    }
}
