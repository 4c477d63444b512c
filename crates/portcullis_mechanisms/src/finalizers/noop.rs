use crate::catalog::MechanismArgs;
use crate::config::{decode, NoConfig};
use crate::handler::SubjectHandler;
use async_trait::async_trait;
use portcullis_core::{CoreResult, RawConfig, RequestContext, Subject};
use std::sync::Arc;

/// Leaves request and response untouched
#[derive(Debug)]
pub struct NoopFinalizer {
    id: String,
    continue_on_error: bool,
}

impl NoopFinalizer {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any settings are given
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        let _: NoConfig = decode(args.config, "noop finalizer", args.id)?;
        Ok(Self {
            id: args.id.to_string(),
            continue_on_error: args.continue_on_error,
        })
    }
}

#[async_trait]
impl SubjectHandler for NoopFinalizer {
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
        tracing::debug!(id = %self.id, "finalizing using noop finalizer");
        Ok(())
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn SubjectHandler>> {
        let _: NoConfig = decode(config, "noop finalizer", &self.id)?;
        Ok(self)
    }
}
