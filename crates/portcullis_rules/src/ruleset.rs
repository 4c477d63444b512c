//! Rule set documents.
//!
//! ```yaml
//! version: "1"
//! name: orders
//! rules:
//!   - id: orders-read
//!     execute:
//!       - authenticator: basic
//!       - authorizer: admins_only
//!         config:
//!           required: { role: admin }
//!       - finalizer: session_cookie
//!     on_error:
//!       - error_handler: login_redirect
//! ```

use portcullis_core::{Error, ErrorKind, RawConfig};
use portcullis_mechanisms::MechanismKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// Rule set loading failure
#[derive(Debug, thiserror::Error)]
pub enum RuleSetError {
    /// The document holds no content
    #[error("empty rule set")]
    Empty,

    /// No parser for the content type
    #[error("unsupported '{0}' content type")]
    UnsupportedContentType(String),

    /// The document does not describe a rule set
    #[error("malformed rule set")]
    Malformed(#[source] serde_yaml::Error),

    /// The rule set is well-formed but inconsistent
    #[error("invalid rule set: {0}")]
    Invalid(String),

    /// Reading the document failed
    #[error("failed to read rule set")]
    Io(#[from] std::io::Error),
}

impl RuleSetError {
    /// Pipeline classification of the failure
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Empty | Self::Malformed(_) | Self::Invalid(_) => ErrorKind::Configuration,
            Self::UnsupportedContentType(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }
}

impl From<RuleSetError> for Error {
    fn from(err: RuleSetError) -> Self {
        Error::new(err.kind(), "failed to load rule set").caused_by(err)
    }
}

/// Versioned collection of rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    /// Document version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Rules
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RuleSet {
    /// Check rule ids are present and unique
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError::Invalid`] naming the offending id
    pub fn validate(&self) -> Result<(), RuleSetError> {
        let mut seen = HashSet::with_capacity(self.rules.len());
        for rule in &self.rules {
            if rule.id.is_empty() {
                return Err(RuleSetError::Invalid("rule without id".to_string()));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(RuleSetError::Invalid(format!("duplicate rule id '{}'", rule.id)));
            }
        }
        Ok(())
    }
}

/// Rule definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Unique id within the rule set
    pub id: String,
    /// Pipeline steps in execution order
    #[serde(default)]
    pub execute: Vec<StepConfig>,
    /// Error handlers in evaluation order
    #[serde(default)]
    pub on_error: Vec<ErrorStepConfig>,
}

/// Reference to an authenticator, authorizer or finalizer prototype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StepDocument", into = "StepDocument")]
pub struct StepConfig {
    /// Stage of the referenced prototype
    pub kind: MechanismKind,
    /// Prototype id
    pub id: String,
    /// Rule level settings
    pub config: Option<RawConfig>,
}

impl StepConfig {
    /// Create a step without settings
    #[must_use]
    pub fn new(kind: MechanismKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            config: None,
        }
    }

    /// Set rule level settings
    #[must_use]
    pub fn with_config(mut self, config: RawConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authenticator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authorizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finalizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<RawConfig>,
}

impl TryFrom<StepDocument> for StepConfig {
    type Error = String;

    fn try_from(doc: StepDocument) -> Result<Self, Self::Error> {
        let (kind, id) = match (doc.authenticator, doc.authorizer, doc.finalizer) {
            (Some(id), None, None) => (MechanismKind::Authenticator, id),
            (None, Some(id), None) => (MechanismKind::Authorizer, id),
            (None, None, Some(id)) => (MechanismKind::Finalizer, id),
            _ => {
                return Err(
                    "a step requires exactly one of 'authenticator', 'authorizer' or 'finalizer'"
                        .to_string(),
                )
            }
        };

        if id.is_empty() {
            return Err(format!("{} reference without id", kind));
        }

        Ok(Self {
            kind,
            id,
            config: doc.config,
        })
    }
}

impl From<StepConfig> for StepDocument {
    fn from(step: StepConfig) -> Self {
        let mut doc = StepDocument {
            config: step.config,
            ..StepDocument::default()
        };
        match step.kind {
            MechanismKind::Authenticator => doc.authenticator = Some(step.id),
            MechanismKind::Authorizer => doc.authorizer = Some(step.id),
            MechanismKind::Finalizer | MechanismKind::ErrorHandler => doc.finalizer = Some(step.id),
        }
        doc
    }
}

/// Reference to an error handler prototype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorStepConfig {
    /// Prototype id
    pub error_handler: String,
    /// Rule level settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RawConfig>,
}

/// Parse a rule set document
///
/// JSON documents are parsed as YAML. Empty documents yield
/// [`RuleSetError::Empty`] regardless of the content type.
///
/// # Errors
///
/// Returns error if the document is empty, malformed, inconsistent or of an
/// unsupported content type
pub fn parse_rules(content_type: &str, mut reader: impl Read) -> Result<RuleSet, RuleSetError> {
    let media_type = content_type.split(';').next().unwrap_or_default().trim();

    match media_type {
        "application/json" | "application/yaml" => {
            let mut content = String::new();
            reader.read_to_string(&mut content)?;
            parse_yaml(&content)
        }
        _ => {
            let mut probe = [0u8; 1];
            if reader.read(&mut probe)? == 0 {
                return Err(RuleSetError::Empty);
            }
            Err(RuleSetError::UnsupportedContentType(content_type.to_string()))
        }
    }
}

fn parse_yaml(content: &str) -> Result<RuleSet, RuleSetError> {
    let blank = content
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'));
    if blank {
        return Err(RuleSetError::Empty);
    }

    let document: serde_yaml::Value = serde_yaml::from_str(content).map_err(RuleSetError::Malformed)?;
    if document.is_null() {
        return Err(RuleSetError::Empty);
    }

    let rule_set: RuleSet = serde_yaml::from_value(document).map_err(RuleSetError::Malformed)?;
    rule_set.validate()?;
    Ok(rule_set)
}

/// Content type of a rule set file, derived from its extension
#[must_use]
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "json" => Some("application/json"),
        "yaml" | "yml" => Some("application/yaml"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
version: "1"
name: test
rules:
  - id: rule1
    execute:
      - authenticator: anon
      - authorizer: allow_all
        config:
          foo: bar
      - finalizer: cookies
    on_error:
      - error_handler: default
"#;

    #[test]
    fn test_parse_yaml() {
        let rule_set = parse_rules("application/yaml", RULES.as_bytes()).unwrap();

        assert_eq!(rule_set.version.as_deref(), Some("1"));
        assert_eq!(rule_set.name.as_deref(), Some("test"));
        assert_eq!(rule_set.rules.len(), 1);

        let rule = &rule_set.rules[0];
        assert_eq!(rule.id, "rule1");
        assert_eq!(rule.execute.len(), 3);
        assert_eq!(rule.execute[0], StepConfig::new(MechanismKind::Authenticator, "anon"));
        assert_eq!(rule.execute[1].kind, MechanismKind::Authorizer);
        assert!(rule.execute[1].config.is_some());
        assert_eq!(rule.execute[2].kind, MechanismKind::Finalizer);
        assert_eq!(rule.on_error[0].error_handler, "default");
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"rules": [{"id": "r", "execute": [{"authenticator": "a"}]}]}"#;
        let rule_set = parse_rules("application/json", json.as_bytes()).unwrap();
        assert_eq!(rule_set.rules[0].execute[0].id, "a");

        let with_params = parse_rules("application/json; charset=utf-8", json.as_bytes()).unwrap();
        assert_eq!(with_params, rule_set);
    }

    #[test]
    fn test_empty_input() {
        for (content_type, content) in [
            ("application/yaml", ""),
            ("application/yaml", "   \n"),
            ("application/yaml", "# only a comment\n"),
            ("application/json", ""),
            ("text/plain", ""),
        ] {
            let err = parse_rules(content_type, content.as_bytes()).unwrap_err();
            assert!(matches!(err, RuleSetError::Empty), "{} {:?}", content_type, content);
        }
    }

    #[test]
    fn test_unsupported_content_type() {
        let err = parse_rules("text/plain", RULES.as_bytes()).unwrap_err();
        assert!(matches!(err, RuleSetError::UnsupportedContentType(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.to_string(), "unsupported 'text/plain' content type");
    }

    #[test]
    fn test_malformed() {
        for content in [
            "rules: [{id: r, execute: [{authenticator: a, authorizer: b}]}]",
            "rules: [{id: r, execute: [{config: {}}]}]",
            "rules: [{id: r, execute: [{authenticator: ''}]}]",
            "rules: [{id: r, unknown: true}]",
            "rules: {id: r}",
            "- just\n- a list",
        ] {
            let err = parse_rules("application/yaml", content.as_bytes()).unwrap_err();
            assert!(matches!(err, RuleSetError::Malformed(_)), "{}", content);
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
    }

    #[test]
    fn test_invalid_ids() {
        let duplicate = "rules: [{id: r}, {id: r}]";
        let err = parse_rules("application/yaml", duplicate.as_bytes()).unwrap_err();
        assert!(matches!(err, RuleSetError::Invalid(_)));
        assert!(err.to_string().contains("'r'"));

        let empty = "rules: [{id: ''}]";
        let err = parse_rules("application/yaml", empty.as_bytes()).unwrap_err();
        assert!(matches!(err, RuleSetError::Invalid(_)));
    }

    #[test]
    fn test_into_core_error() {
        let err: Error = RuleSetError::Empty.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "failed to load rule set: empty rule set");
    }

    #[test]
    fn test_step_serializes_back() {
        let step = StepConfig::new(MechanismKind::Authorizer, "allow_all");
        let yaml = serde_yaml::to_string(&step).unwrap();
        assert_eq!(yaml.trim(), "authorizer: allow_all");
    }

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("rules.yaml")), Some("application/yaml"));
        assert_eq!(content_type_for_path(Path::new("rules.yml")), Some("application/yaml"));
        assert_eq!(content_type_for_path(Path::new("/etc/rules.json")), Some("application/json"));
        assert_eq!(content_type_for_path(Path::new("rules.toml")), None);
        assert_eq!(content_type_for_path(Path::new("rules")), None);
    }
}
