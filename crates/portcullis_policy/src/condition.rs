//! Error conditions deciding whether an error handler applies.

use crate::matcher::{CidrMatcher, ErrorTypeMatcher, HeaderMatcher};
use portcullis_core::{Error, RequestContext};
use serde::{Deserialize, Serialize};

/// Conjunction of matchers; an absent matcher imposes no constraint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorConditionMatcher {
    /// Accepted error kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorTypeMatcher>,

    /// Accepted client networks
    #[serde(rename = "request_cidr", default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<CidrMatcher>,

    /// Accepted request header values
    #[serde(rename = "request_header", default, skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderMatcher>,
}

impl ErrorConditionMatcher {
    /// Restrict to error kinds
    #[must_use]
    pub fn with_error(mut self, matcher: ErrorTypeMatcher) -> Self {
        self.error = Some(matcher);
        self
    }

    /// Restrict to client networks
    #[must_use]
    pub fn with_cidr(mut self, matcher: CidrMatcher) -> Self {
        self.cidr = Some(matcher);
        self
    }

    /// Restrict to request headers
    #[must_use]
    pub fn with_header(mut self, matcher: HeaderMatcher) -> Self {
        self.header = Some(matcher);
        self
    }

    /// True if every configured matcher accepts
    #[must_use]
    pub fn matches(&self, ctx: &dyn RequestContext, err: &Error) -> bool {
        self.error.as_ref().map_or(true, |m| m.matches(err))
            && self
                .cidr
                .as_ref()
                .map_or(true, |m| m.matches(ctx.request_client_ips()))
            && self
                .header
                .as_ref()
                .map_or(true, |m| m.matches(ctx.request_headers()))
    }
}

/// Disjunction of [`ErrorConditionMatcher`]s
///
/// An empty condition matches every error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCondition(Vec<ErrorConditionMatcher>);

impl ErrorCondition {
    /// Create a condition from alternatives
    #[must_use]
    pub fn new(alternatives: Vec<ErrorConditionMatcher>) -> Self {
        Self(alternatives)
    }

    /// Whether no alternatives are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if any alternative matches, or none are configured
    #[must_use]
    pub fn matches(&self, ctx: &dyn RequestContext, err: &Error) -> bool {
        self.0.is_empty() || self.0.iter().any(|m| m.matches(ctx, err))
    }
}
