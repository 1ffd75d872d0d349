use std::{fmt::Write, path::Path, sync::OnceLock};

use anyhow::{Context, bail};
use regex::Regex;
use serde::Deserialize;
use toml::Value;

use crate::Config;

/// Load configuration from a TOML file, expanding `{{ env.VAR }}`
/// references before deserializing.
pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

    from_str(&content)
}

/// Parse configuration from a TOML string, expanding `{{ env.VAR }}`
/// references before deserializing.
pub fn from_str(content: &str) -> anyhow::Result<Config> {
    let mut raw_config: Value = toml::from_str(content)?;

    expand_env_references(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;

    Ok(config)
}

fn env_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();

    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("env reference pattern is valid")
    })
}

fn expand_env_references<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => {
            if let Some(expanded) = expand_string(s, path)? {
                *s = expanded;
            }
        }
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_env_references(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_env_references(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

fn expand_string(s: &str, path: &[Result<&str, usize>]) -> anyhow::Result<Option<String>> {
    if !env_reference().is_match(s) {
        return Ok(None);
    }

    let mut expanded = String::with_capacity(s.len());
    let mut cursor = 0;

    for captures in env_reference().captures_iter(s) {
        let whole = captures.get(0).expect("capture group 0 always exists");
        let name = &captures[1];

        let Ok(value) = std::env::var(name) else {
            bail!(
                "Failed to expand environment reference at path '{}': variable '{name}' is not set",
                render_path(path)
            );
        };

        expanded.push_str(&s[cursor..whole.start()]);
        expanded.push_str(&value);
        cursor = whole.end();
    }

    expanded.push_str(&s[cursor..]);

    Ok(Some(expanded))
}

fn render_path(path: &[Result<&str, usize>]) -> String {
    let mut rendered = String::new();

    for segment in path {
        match segment {
            Ok(key) => {
                rendered.push_str(key);
                rendered.push('.');
            }
            Err(i) => write!(rendered, "[{i}]").expect("writing to a string never fails"),
        }
    }

    if rendered.ends_with('.') {
        rendered.pop();
    }

    rendered
}
