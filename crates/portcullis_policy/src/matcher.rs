//! Independent predicates over an error and the request it occurred in.

use http::HeaderMap;
use ipnet::IpNet;
use portcullis_core::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Matches errors by classification
///
/// An error matches when it *is* one of the configured kinds, so
/// `authentication_error` also catches missing-credential errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorTypeMatcher(Vec<ErrorKind>);

impl ErrorTypeMatcher {
    /// Create a matcher for the given kinds
    #[must_use]
    pub fn new(kinds: Vec<ErrorKind>) -> Self {
        Self(kinds)
    }

    /// Check the error against the configured kinds
    #[must_use]
    pub fn matches(&self, err: &Error) -> bool {
        self.0.iter().any(|kind| err.is(*kind))
    }
}

/// Matches client addresses against network ranges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CidrMatcher(Vec<IpNet>);

impl CidrMatcher {
    /// Create a matcher for the given networks
    #[must_use]
    pub fn new(networks: Vec<IpNet>) -> Self {
        Self(networks)
    }

    /// True if any parseable address lies in any configured network
    #[must_use]
    pub fn matches(&self, ips: &[String]) -> bool {
        ips.iter()
            .filter_map(|ip| ip.trim().parse::<IpAddr>().ok())
            .any(|ip| self.0.iter().any(|net| net.contains(&ip)))
    }
}

/// Matches request header values
///
/// Keys are header names, values the accepted header values. A request
/// matches if any configured header is present with an accepted value.
/// Comma separated header values are checked one by one, parameters after
/// `;` are ignored and comparison is case-insensitive. The accepted value
/// `*` matches any value and `type/*` matches any subtype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderMatcher(BTreeMap<String, Vec<String>>);

impl HeaderMatcher {
    /// Create a matcher from header name to accepted values
    #[must_use]
    pub fn new(headers: BTreeMap<String, Vec<String>>) -> Self {
        Self(headers)
    }

    /// Check the request headers
    #[must_use]
    pub fn matches(&self, headers: &HeaderMap) -> bool {
        self.0.iter().any(|(name, accepted)| {
            headers
                .get_all(name.as_str())
                .iter()
                .filter_map(|value| value.to_str().ok())
                .flat_map(|value| value.split(','))
                .map(|value| value.split(';').next().unwrap_or_default().trim())
                .any(|value| accepted.iter().any(|pattern| value_matches(pattern, value)))
        })
    }
}

fn value_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if let Some(prefix) = pattern.strip_suffix("/*") {
        return value
            .split_once('/')
            .is_some_and(|(kind, _)| kind.eq_ignore_ascii_case(prefix));
    }

    pattern.eq_ignore_ascii_case(value)
}
