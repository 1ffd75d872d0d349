//! Host-facing invocation contract.
//!
//! The host runtime carries named values in three layers (configuration,
//! parameters, inputs) and agents resolve them into a typed settings struct
//! exactly once at call entry.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::AgentError;

/// Callback invoked once per streamed text token, in arrival order. The
/// return value is ignored.
pub type TokenCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A single call from the host runtime.
#[derive(Clone, Default)]
pub struct Invocation {
    pub inputs: Map<String, Value>,
    pub params: Map<String, Value>,
    pub config: Map<String, Value>,
    pub token_callback: Option<TokenCallback>,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn on_token(mut self, callback: TokenCallback) -> Self {
        self.token_callback = Some(callback);
        self
    }

    /// Resolve the precedence-ordered settings for this invocation: config
    /// lowest, params above it, inputs highest. Explicit nulls are treated
    /// as absent rather than overriding a lower layer.
    pub fn resolve<T: DeserializeOwned>(&self) -> crate::Result<T> {
        let mut merged = Map::new();

        for layer in [&self.config, &self.params, &self.inputs] {
            for (key, value) in layer {
                if value.is_null() {
                    continue;
                }

                merged.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(Value::Object(merged)).map_err(|e| AgentError::InvalidInput(e.to_string()))
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("inputs", &self.inputs)
            .field("params", &self.params)
            .field("config", &self.config)
            .field("token_callback", &self.token_callback.as_ref().map(|_| "Fn"))
            .finish()
    }
}

/// A stateless agent function the host runtime can invoke.
#[async_trait]
pub trait AgentFunction: Send + Sync {
    /// Name the host uses to look this agent up.
    fn name(&self) -> &'static str;

    /// Run one invocation to completion.
    async fn invoke(&self, invocation: Invocation) -> crate::Result<Value>;
}

/// Name-keyed set of agent functions.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<&'static str, Arc<dyn AgentFunction>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every agent this crate provides, with the given
    /// chat defaults.
    pub fn with_defaults(chat: config::ChatProviderConfig) -> crate::Result<Self> {
        let mut registry = Self::new();

        registry.register(Arc::new(crate::ChatCompletionAgent::new(chat)?));
        registry.register(Arc::new(crate::AverageScoreAgent));
        registry.register(Arc::new(crate::SelectLlmAgent));

        Ok(registry)
    }

    pub fn register(&mut self, agent: Arc<dyn AgentFunction>) {
        self.agents.insert(agent.name(), agent);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AgentFunction>> {
        self.agents.get(name)
    }

    pub async fn invoke(&self, name: &str, invocation: Invocation) -> crate::Result<Value> {
        let agent = self
            .get(name)
            .ok_or_else(|| AgentError::AgentNotFound(name.to_string()))?;

        agent.invoke(invocation).await
    }
}
