use crate::catalog::MechanismArgs;
use crate::config::{decode, NoConfig};
use crate::handler::SubjectHandler;
use async_trait::async_trait;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext, Subject};
use std::sync::Arc;

/// Rejects every request
#[derive(Debug)]
pub struct UnauthorizedAuthenticator {
    id: String,
    continue_on_error: bool,
}

impl UnauthorizedAuthenticator {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any settings are given
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        let _: NoConfig = decode(args.config, "unauthorized authenticator", args.id)?;
        Ok(Self {
            id: args.id.to_string(),
            continue_on_error: args.continue_on_error,
        })
    }
}

#[async_trait]
impl SubjectHandler for UnauthorizedAuthenticator {
    fn handler_id(&self) -> &str {
        &self.id
    }

    fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    async fn execute(
        &self,
        _ctx: &dyn RequestContext,
        subject: &mut Option<Subject>,
    ) -> CoreResult<()> {
        if subject.is_some() {
            return Ok(());
        }

        tracing::debug!(id = %self.id, "authenticating using unauthorized authenticator");
        Err(Error::authentication("denied by authenticator").with_handler_id(&self.id))
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn SubjectHandler>> {
        let _: NoConfig = decode(config, "unauthorized authenticator", &self.id)?;
        Ok(self)
    }
}
