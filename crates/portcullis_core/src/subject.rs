//! Authenticated principal.

use crate::context::Request;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Principal resolved by the authenticator stage
///
/// A subject lives for a single request and is handed from stage to stage by
/// mutable reference, so later mechanisms may add attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Identifier, unique within the request
    #[serde(rename = "ID")]
    pub id: String,
    /// Arbitrary attributes
    #[serde(rename = "Attributes", default)]
    pub attributes: Map<String, Value>,
}

impl Subject {
    /// Create a subject without attributes
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Data handed to templates: the subject's own fields at the root, plus
    /// `Subject` and `Request` entries.
    #[must_use]
    pub fn template_data(&self, request: &Request) -> Value {
        let mut data = Map::new();
        data.insert("ID".to_string(), Value::String(self.id.clone()));
        data.insert(
            "Attributes".to_string(),
            Value::Object(self.attributes.clone()),
        );
        data.insert("Subject".to_string(), Value::Object(data.clone()));
        data.insert("Request".to_string(), request.template_value());

        Value::Object(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use url::Url;

    #[test]
    fn test_subject_attributes() {
        let sub = Subject::new("alice").with_attribute("role", "admin");
        assert_eq!(sub.attribute("role"), Some(&Value::from("admin")));
        assert!(sub.attribute("missing").is_none());
    }

    #[test]
    fn test_template_data() {
        let req = Request::new(Method::POST, Url::parse("https://example.com/a").unwrap());
        let sub = Subject::new("FooBar").with_attribute("bar", "baz");

        let data = sub.template_data(&req);
        assert_eq!(data["ID"], "FooBar");
        assert_eq!(data["Attributes"]["bar"], "baz");
        assert_eq!(data["Subject"]["ID"], "FooBar");
        assert_eq!(data["Request"]["Method"], "POST");
    }

    #[test]
    fn test_subject_serde() {
        let sub = Subject::new("bob").with_attribute("n", 1);
        let encoded = serde_json::to_value(&sub).unwrap();
        assert_eq!(encoded["ID"], "bob");
        let decoded: Subject = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, sub);
    }
}
