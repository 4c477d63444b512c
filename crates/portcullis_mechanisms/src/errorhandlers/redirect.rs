use crate::catalog::MechanismArgs;
use crate::config::{decode, merge};
use crate::handler::{ErrorHandler, ErrorOutcome};
use async_trait::async_trait;
use http::StatusCode;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext};
use portcullis_policy::ErrorCondition;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

const REDIRECT_CODES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

fn default_code() -> u16 {
    StatusCode::FOUND.as_u16()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RedirectConfig {
    to: Url,
    #[serde(default = "default_code")]
    code: u16,
    #[serde(default)]
    return_to_query_parameter: Option<String>,
    #[serde(default)]
    when: ErrorCondition,
}

/// Redirects the client, e.g. to a login page
#[derive(Debug)]
pub struct RedirectErrorHandler {
    id: String,
    raw: RawConfig,
    to: Url,
    code: StatusCode,
    return_to_query_parameter: Option<String>,
    when: ErrorCondition,
}

impl RedirectErrorHandler {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed settings, a missing `when`
    /// condition or a non-redirect code
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::build(args.id, args.config.cloned().unwrap_or_default())
    }

    fn build(id: &str, raw: RawConfig) -> CoreResult<Self> {
        let config: RedirectConfig = decode(Some(&raw), "redirect error handler", id)?;

        if config.when.is_empty() {
            return Err(Error::configuration("no 'when' error handler conditions defined for the redirect error handler")
                .with_handler_id(id));
        }

        let code = REDIRECT_CODES
            .into_iter()
            .find(|code| code.as_u16() == config.code)
            .ok_or_else(|| {
                Error::configuration(format!("'{}' is not a supported redirect code", config.code))
                    .with_handler_id(id)
            })?;

        if config
            .return_to_query_parameter
            .as_deref()
            .is_some_and(str::is_empty)
        {
            return Err(Error::configuration("return_to_query_parameter must not be empty").with_handler_id(id));
        }

        Ok(Self {
            id: id.to_string(),
            raw,
            to: config.to,
            code,
            return_to_query_parameter: config.return_to_query_parameter,
            when: config.when,
        })
    }
}

#[async_trait]
impl ErrorHandler for RedirectErrorHandler {
    fn handler_id(&self) -> &str {
        &self.id
    }

    fn can_handle(&self, ctx: &dyn RequestContext, err: &Error) -> bool {
        self.when.matches(ctx, err)
    }

    async fn handle(&self, ctx: &dyn RequestContext, err: &Error) -> CoreResult<ErrorOutcome> {
        tracing::debug!(id = %self.id, error = %err, "handling error using redirect error handler");

        let mut location = self.to.clone();
        if let Some(param) = &self.return_to_query_parameter {
            location
                .query_pairs_mut()
                .append_pair(param, ctx.request().url.as_str());
        }

        Ok(ErrorOutcome::Redirect {
            code: self.code,
            location: location.into(),
        })
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn ErrorHandler>> {
        match merge(&self.raw, config) {
            Some(raw) => Ok(Arc::new(Self::build(&self.id, raw)?)),
            None => Ok(self),
        }
    }
}
