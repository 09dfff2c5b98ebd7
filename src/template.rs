//! Template interpolation for endpoint paths and query parameters
//!
//! Handles `{{ variable }}` placeholders filled from a stream [`Context`],
//! e.g. `/form-integrations/v1/submissions/forms/{{ form_id }}`.

use crate::error::{Error, Result};
use crate::partition::Context;
use crate::types::StringMap;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").expect("template regex is valid")
});

/// Render a template string with the given context
///
/// Every placeholder must be defined; missing names are reported together.
pub fn render(template: &str, ctx: &Context) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        match ctx.get(&cap[1]) {
            Some(value) => value_to_string(value),
            None => {
                missing.push(cap[1].to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Render each value of a parameter map
pub fn render_params(params: &[(&str, &str)], ctx: &Context) -> Result<StringMap> {
    params
        .iter()
        .map(|(key, template)| Ok(((*key).to_string(), render(template, ctx)?)))
        .collect()
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
