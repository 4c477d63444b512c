use crate::catalog::MechanismArgs;
use crate::config::{decode, NoConfig};
use crate::handler::SubjectHandler;
use async_trait::async_trait;
use portcullis_core::{CoreResult, RawConfig, RequestContext, Subject};
use std::sync::Arc;

/// Establishes a subject with an empty id, for public endpoints
#[derive(Debug)]
pub struct NoopAuthenticator {
    id: String,
    continue_on_error: bool,
}

impl NoopAuthenticator {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any settings are given
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        let _: NoConfig = decode(args.config, "noop authenticator", args.id)?;
        Ok(Self {
            id: args.id.to_string(),
            continue_on_error: args.continue_on_error,
        })
    }
}

#[async_trait]
impl SubjectHandler for NoopAuthenticator {
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
        if subject.is_none() {
            tracing::debug!(id = %self.id, "authenticating using noop authenticator");
            *subject = Some(Subject::default());
        }
        Ok(())
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn SubjectHandler>> {
        let _: NoConfig = decode(config, "noop authenticator", &self.id)?;
        Ok(self)
    }
}
