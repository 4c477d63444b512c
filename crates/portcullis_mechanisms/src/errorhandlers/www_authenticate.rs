use crate::catalog::MechanismArgs;
use crate::config::{decode, merge};
use crate::handler::{ErrorHandler, ErrorOutcome};
use async_trait::async_trait;
use http::header::WWW_AUTHENTICATE;
use http::{HeaderValue, StatusCode};
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext};
use portcullis_policy::ErrorCondition;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_realm() -> String {
    "Please authenticate".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WwwAuthenticateConfig {
    #[serde(default = "default_realm")]
    realm: String,
    #[serde(default)]
    when: ErrorCondition,
}

/// Challenges the client for HTTP Basic credentials
#[derive(Debug)]
pub struct WwwAuthenticateErrorHandler {
    id: String,
    raw: RawConfig,
    challenge: String,
    when: ErrorCondition,
}

impl WwwAuthenticateErrorHandler {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed settings, a missing `when`
    /// condition or a realm unfit for a header value
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::build(args.id, args.config.cloned().unwrap_or_default())
    }

    fn build(id: &str, raw: RawConfig) -> CoreResult<Self> {
        let config: WwwAuthenticateConfig = decode(Some(&raw), "www_authenticate error handler", id)?;

        if config.when.is_empty() {
            return Err(Error::configuration(
                "no 'when' error handler conditions defined for the www_authenticate error handler",
            )
            .with_handler_id(id));
        }

        let challenge = format!("Basic realm=\"{}\"", config.realm);
        if config.realm.contains('"') || HeaderValue::from_str(&challenge).is_err() {
            return Err(Error::configuration(format!("invalid realm '{}'", config.realm)).with_handler_id(id));
        }

        Ok(Self {
            id: id.to_string(),
            raw,
            challenge,
            when: config.when,
        })
    }
}

#[async_trait]
impl ErrorHandler for WwwAuthenticateErrorHandler {
    fn handler_id(&self) -> &str {
        &self.id
    }

    fn can_handle(&self, ctx: &dyn RequestContext, err: &Error) -> bool {
        self.when.matches(ctx, err)
    }

    async fn handle(&self, _ctx: &dyn RequestContext, err: &Error) -> CoreResult<ErrorOutcome> {
        tracing::debug!(id = %self.id, error = %err, "handling error using www_authenticate error handler");
        Ok(ErrorOutcome::Respond {
            code: StatusCode::UNAUTHORIZED,
            headers: BTreeMap::from([(WWW_AUTHENTICATE.to_string(), self.challenge.clone())]),
        })
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn ErrorHandler>> {
        match merge(&self.raw, config) {
            Some(raw) => Ok(Arc::new(Self::build(&self.id, raw)?)),
            None => Ok(self),
        }
    }
}
