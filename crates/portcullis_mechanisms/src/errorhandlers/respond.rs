use crate::catalog::MechanismArgs;
use crate::config::{decode, merge};
use crate::handler::{ErrorHandler, ErrorOutcome};
use async_trait::async_trait;
use http::StatusCode;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext};
use portcullis_policy::ErrorCondition;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_code() -> u16 {
    StatusCode::FORBIDDEN.as_u16()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RespondConfig {
    #[serde(default = "default_code")]
    code: u16,
    #[serde(default)]
    when: ErrorCondition,
}

/// Answers with a fixed status code
#[derive(Debug)]
pub struct RespondErrorHandler {
    id: String,
    raw: RawConfig,
    code: StatusCode,
    when: ErrorCondition,
}

impl RespondErrorHandler {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed settings or a code outside
    /// the error range
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::build(args.id, args.config.cloned().unwrap_or_default())
    }

    fn build(id: &str, raw: RawConfig) -> CoreResult<Self> {
        let config: RespondConfig = decode(Some(&raw), "respond error handler", id)?;
        let code = StatusCode::from_u16(config.code)
            .ok()
            .filter(|code| code.is_client_error() || code.is_server_error())
            .ok_or_else(|| {
                Error::configuration(format!("'{}' is not an error status code", config.code))
                    .with_handler_id(id)
            })?;

        Ok(Self {
            id: id.to_string(),
            raw,
            code,
            when: config.when,
        })
    }
}

#[async_trait]
impl ErrorHandler for RespondErrorHandler {
    fn handler_id(&self) -> &str {
        &self.id
    }

    fn can_handle(&self, ctx: &dyn RequestContext, err: &Error) -> bool {
        self.when.matches(ctx, err)
    }

    async fn handle(&self, _ctx: &dyn RequestContext, err: &Error) -> CoreResult<ErrorOutcome> {
        tracing::debug!(id = %self.id, code = self.code.as_u16(), error = %err, "handling error using respond error handler");
        Ok(ErrorOutcome::Respond {
            code: self.code,
            headers: BTreeMap::new(),
        })
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn ErrorHandler>> {
        match merge(&self.raw, config) {
            Some(raw) => Ok(Arc::new(Self::build(&self.id, raw)?)),
            None => Ok(self),
        }
    }
}
