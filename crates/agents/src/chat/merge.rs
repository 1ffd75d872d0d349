//! Assembly of mergeable text values.

use serde_json::{Map, Value};

/// Build one text value from the mergeable fragments stored under `key` in
/// the params and input layers plus the scalar value, in that order.
/// Fragments that are empty after trimming are dropped; survivors are
/// joined with a single newline. `None` means the value is absent.
pub(super) fn merge_value(
    params: &Map<String, Value>,
    inputs: &Map<String, Value>,
    key: &str,
    value: Option<&str>,
) -> Option<String> {
    let mut fragments: Vec<&str> = Vec::new();

    for layer in [params, inputs] {
        collect_fragments(layer.get(key), &mut fragments);
    }

    if let Some(value) = value {
        fragments.push(value);
    }

    let joined = fragments
        .into_iter()
        .filter(|fragment| !fragment.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    (!joined.is_empty()).then_some(joined)
}

fn collect_fragments<'a>(value: Option<&'a Value>, fragments: &mut Vec<&'a str>) {
    match value {
        Some(Value::String(text)) => fragments.push(text),
        Some(Value::Array(items)) => {
            for item in items {
                if let Some(text) = item.as_str() {
                    fragments.push(text);
                }
            }
        }
        _ => {}
    }
}
