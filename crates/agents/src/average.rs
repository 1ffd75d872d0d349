//! Score averaging agent.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::runtime::{AgentFunction, Invocation};

/// Averages numeric-looking scores, discarding values that do not coerce.
///
/// Generation models sometimes wrap a numeric judgment in prose ("hard to
/// say, but roughly 50"); such values fail coercion and are dropped rather
/// than failing the call.
pub struct AverageScoreAgent;

#[derive(Debug, Deserialize)]
struct AverageScoreInputs {
    scores: Vec<Value>,
}

/// Arithmetic mean of the coercible subset of `scores`.
///
/// Returns NaN when no value survives coercion; callers must handle the
/// degenerate case themselves.
pub fn average_score(scores: &[Value]) -> f64 {
    let parsed: Vec<f64> = scores.iter().filter_map(coerce_score).collect();

    parsed.iter().sum::<f64>() / parsed.len() as f64
}

fn coerce_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl AgentFunction for AverageScoreAgent {
    fn name(&self) -> &'static str {
        "averageScoreAgent"
    }

    async fn invoke(&self, invocation: Invocation) -> crate::Result<Value> {
        let inputs: AverageScoreInputs = invocation.resolve()?;

        let score = average_score(&inputs.scores);

        // JSON has no NaN; the all-discarded case serializes as null.
        Ok(json!({ "score": score }))
    }
}
