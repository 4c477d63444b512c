//! Value templates used by finalizers.
//!
//! A template is literal text with `{{ .Path.To.Field }}` actions resolved
//! against a JSON document. Only field access is supported; functions and
//! pipelines are rejected when rendering.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Template rendering failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// `{{` without matching `}}`
    #[error("unclosed action at offset {offset}")]
    Unclosed {
        /// Byte offset of the opening delimiter
        offset: usize,
    },

    /// Action is not a field reference
    #[error("unsupported action '{action}'")]
    Unsupported {
        /// Offending action text
        action: String,
    },
}

/// Template source text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(String);

impl Template {
    /// Create a template from source text
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// Source text
    #[must_use]
    pub fn source(&self) -> &str {
        &self.0
    }

    /// Render the template against `data`
    ///
    /// # Errors
    ///
    /// Returns error if an action is unclosed or not a plain field reference
    pub fn render(&self, data: &Value) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let body = &rest[start + 2..];
            let end = body.find("}}").ok_or(TemplateError::Unclosed {
                offset: offset + start,
            })?;

            out.push_str(&evaluate(body[..end].trim(), data)?);

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

impl From<&str> for Template {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

fn evaluate(action: &str, data: &Value) -> Result<String, TemplateError> {
    let unsupported = || TemplateError::Unsupported {
        action: action.to_string(),
    };

    if !action.starts_with('.') || action.contains(char::is_whitespace) || action.contains('|') {
        return Err(unsupported());
    }

    let mut current = data;
    for segment in action[1..].split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(value) => value,
                None => return Ok(String::new()),
            },
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(value) => value,
                None => return Ok(String::new()),
            },
            _ => return Ok(String::new()),
        };
    }

    Ok(stringify(current))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
