use crate::catalog::MechanismArgs;
use crate::config::{decode, NoConfig};
use crate::handler::SubjectHandler;
use async_trait::async_trait;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext, Subject};
use std::sync::Arc;

/// Authorizer with a fixed verdict
#[derive(Debug)]
pub struct FixedAuthorizer {
    id: String,
    continue_on_error: bool,
    allow: bool,
}

impl FixedAuthorizer {
    /// Build an authorizer granting every request
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any settings are given
    pub fn allow(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::new(args, true)
    }

    /// Build an authorizer denying every request
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any settings are given
    pub fn deny(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::new(args, false)
    }

    fn new(args: &MechanismArgs<'_>, allow: bool) -> CoreResult<Self> {
        let _: NoConfig = decode(args.config, Self::mechanism(allow), args.id)?;
        Ok(Self {
            id: args.id.to_string(),
            continue_on_error: args.continue_on_error,
            allow,
        })
    }

    fn mechanism(allow: bool) -> &'static str {
        if allow {
            "allow authorizer"
        } else {
            "deny authorizer"
        }
    }
}

#[async_trait]
impl SubjectHandler for FixedAuthorizer {
    fn handler_id(&self) -> &str {
        &self.id
    }

    fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    async fn execute(
        &self,
        _ctx: &dyn RequestContext,
        _subject: &mut Option<Subject>,
    ) -> CoreResult<()> {
        tracing::debug!(id = %self.id, allow = self.allow, "authorizing using fixed authorizer");
        if self.allow {
            Ok(())
        } else {
            Err(Error::authorization("denied by authorizer").with_handler_id(&self.id))
        }
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn SubjectHandler>> {
        let _: NoConfig = decode(config, Self::mechanism(self.allow), &self.id)?;
        Ok(self)
    }
}
