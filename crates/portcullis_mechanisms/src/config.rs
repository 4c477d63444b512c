//! Typed decoding of mechanism settings.

use portcullis_core::{config, decode_config, overlay, CoreResult, Error, RawConfig};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Settings of mechanisms that take none
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct NoConfig {}

/// Decode settings, treating absent settings as an empty document
pub(crate) fn decode<T: DeserializeOwned>(
    raw: Option<&RawConfig>,
    mechanism: &str,
    id: &str,
) -> CoreResult<T> {
    let empty = RawConfig::new();
    decode_config(raw.unwrap_or(&empty)).map_err(|err| {
        Error::configuration(format!("failed to unmarshal {} config", mechanism))
            .with_handler_id(id)
            .caused_by(err)
    })
}

/// Merged settings for a specialization, `None` if there is nothing to merge
pub(crate) fn merge(prototype: &RawConfig, overrides: Option<&RawConfig>) -> Option<RawConfig> {
    if config::is_empty(overrides) {
        return None;
    }
    overrides.map(|overrides| overlay(prototype, overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::ErrorKind;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        #[serde(default)]
        name: String,
    }

    #[test]
    fn test_decode_absent_uses_defaults() {
        let sample: Sample = decode(None, "sample", "s1").unwrap();
        assert_eq!(sample.name, "");

        let _: NoConfig = decode(None, "noop authenticator", "noop").unwrap();
    }

    #[test]
    fn test_decode_unknown_field() {
        let raw = json!({"nmae": "typo"}).as_object().cloned().unwrap();
        let err = decode::<Sample>(Some(&raw), "sample", "s1").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.handler_id(), Some("s1"));
        assert!(err.to_string().starts_with("failed to unmarshal sample config"));
    }

    #[test]
    fn test_merge() {
        let proto = json!({"a": 1, "b": 2}).as_object().cloned().unwrap();
        let empty = RawConfig::new();
        assert!(merge(&proto, None).is_none());
        assert!(merge(&proto, Some(&empty)).is_none());

        let overrides = json!({"b": 3}).as_object().cloned().unwrap();
        let merged = merge(&proto, Some(&overrides)).unwrap();
        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(3)));
    }
}
