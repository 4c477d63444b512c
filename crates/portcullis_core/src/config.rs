//! Schema-less mechanism configuration.
//!
//! Mechanism configuration arrives as an untyped key/value document and is
//! decoded into a typed struct per mechanism. Typed structs reject unknown
//! fields, so a misspelled key fails the build instead of being ignored.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Untyped mechanism configuration
pub type RawConfig = Map<String, Value>;

/// Decode raw configuration into a typed struct
///
/// # Errors
///
/// Returns the decoder error if the document does not fit `T`
pub fn decode_config<T: DeserializeOwned>(raw: &RawConfig) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(raw.clone()))
}

/// Whether an override document carries no settings
#[must_use]
pub fn is_empty(overrides: Option<&RawConfig>) -> bool {
    overrides.map_or(true, Map::is_empty)
}

/// Merge `overrides` onto `prototype`
///
/// Top-level keys present in `overrides` replace the prototype's value
/// wholesale, nested maps included. Keys absent from `overrides` keep the
/// prototype's value.
#[must_use]
pub fn overlay(prototype: &RawConfig, overrides: &RawConfig) -> RawConfig {
    let mut merged = prototype.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
