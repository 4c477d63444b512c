//! Strategies locating authentication data in a request.

use portcullis_core::{CoreResult, Error, RequestContext};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Locates one piece of authentication data
pub trait AuthDataExtractStrategy: Debug + Send + Sync {
    /// Extract the value
    ///
    /// # Errors
    ///
    /// Returns an authentication data error if the value is absent
    fn extract(&self, ctx: &dyn RequestContext) -> CoreResult<String>;
}

/// Value of a request header, optionally prefixed by an auth scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderValueExtractStrategy {
    /// Header name
    pub name: String,
    /// Scheme the value must start with, e.g. `Bearer`
    pub scheme: Option<String>,
}

impl AuthDataExtractStrategy for HeaderValueExtractStrategy {
    fn extract(&self, ctx: &dyn RequestContext) -> CoreResult<String> {
        let value = ctx
            .request_headers()
            .get(self.name.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                Error::authentication_data(format!("no '{}' header present", self.name))
            })?;

        let Some(scheme) = &self.scheme else {
            return Ok(value.to_string());
        };

        match value.split_once(' ') {
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case(scheme) && !rest.trim().is_empty() => {
                Ok(rest.trim().to_string())
            }
            _ => Err(Error::authentication_data(format!(
                "'{}' header does not contain '{}' scheme",
                self.name, scheme
            ))),
        }
    }
}

/// Value of a request cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieValueExtractStrategy {
    /// Cookie name
    pub name: String,
}

impl AuthDataExtractStrategy for CookieValueExtractStrategy {
    fn extract(&self, ctx: &dyn RequestContext) -> CoreResult<String> {
        ctx.request_cookie(&self.name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::authentication_data(format!("no '{}' cookie present", self.name)))
    }
}

/// Value of a URL query parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameterExtractStrategy {
    /// Parameter name
    pub name: String,
}

impl AuthDataExtractStrategy for QueryParameterExtractStrategy {
    fn extract(&self, ctx: &dyn RequestContext) -> CoreResult<String> {
        ctx.request_query_parameter(&self.name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                Error::authentication_data(format!("no '{}' query parameter present", self.name))
            })
    }
}

/// First successful strategy wins
#[derive(Debug, Default)]
pub struct CompositeExtractStrategy(Vec<Box<dyn AuthDataExtractStrategy>>);

impl CompositeExtractStrategy {
    /// Create from strategies, tried in order
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn AuthDataExtractStrategy>>) -> Self {
        Self(strategies)
    }

    /// Build from configured sources
    ///
    /// # Errors
    ///
    /// Returns error text if a source is ambiguous or empty
    pub fn from_sources(sources: &[ExtractSource]) -> Result<Self, String> {
        sources
            .iter()
            .map(ExtractSource::strategy)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Number of strategies
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no strategies are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AuthDataExtractStrategy for CompositeExtractStrategy {
    fn extract(&self, ctx: &dyn RequestContext) -> CoreResult<String> {
        let mut last = None;
        for strategy in &self.0 {
            match strategy.extract(ctx) {
                Ok(value) => return Ok(value),
                Err(err) => last = Some(err),
            }
        }

        Err(last.unwrap_or_else(|| Error::authentication_data("no authentication data present")))
    }
}

/// Configured location of authentication data
///
/// Exactly one of `header`, `cookie` or `query_parameter` must be set;
/// `scheme` only applies to headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractSource {
    /// Header name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Header auth scheme
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Cookie name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    /// Query parameter name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_parameter: Option<String>,
}

impl ExtractSource {
    fn strategy(&self) -> Result<Box<dyn AuthDataExtractStrategy>, String> {
        match (&self.header, &self.cookie, &self.query_parameter) {
            (Some(name), None, None) if !name.is_empty() => Ok(Box::new(HeaderValueExtractStrategy {
                name: name.clone(),
                scheme: self.scheme.clone(),
            })),
            (None, Some(name), None) if !name.is_empty() && self.scheme.is_none() => {
                Ok(Box::new(CookieValueExtractStrategy { name: name.clone() }))
            }
            (None, None, Some(name)) if !name.is_empty() && self.scheme.is_none() => {
                Ok(Box::new(QueryParameterExtractStrategy { name: name.clone() }))
            }
            _ => Err(
                "an authentication data source requires exactly one non-empty 'header', 'cookie' or 'query_parameter'"
                    .to_string(),
            ),
        }
    }
}
