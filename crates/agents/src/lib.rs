//! Stateless agent functions for a graph-based task orchestration runtime.
//!
//! The host runtime looks agents up by name in an [`AgentRegistry`] and
//! invokes them with named inputs, parameters, and configuration. Three
//! agents are provided:
//!
//! - `chatCompletionAgent`: adapts an OpenAI-compatible chat completion
//!   endpoint (streaming included) into a normalized response shape
//! - `averageScoreAgent`: averages numeric-looking scores, discarding
//!   values that do not parse
//! - `selectLLMAgent`: picks an LLM configuration by name from a fixed
//!   option list and partitions the rest

mod average;
mod chat;
mod error;
pub mod messages;
mod runtime;
mod select;

pub use average::{AverageScoreAgent, average_score};
pub use chat::{ChatCompletionAgent, NormalizedResponse, ToolArguments, ToolInvocation};
pub use error::{AgentError, Result};
pub use runtime::{AgentFunction, AgentRegistry, Invocation, TokenCallback};
pub use select::{LlmSelection, SelectLlmAgent, select_llm};
