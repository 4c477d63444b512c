//! Ordered chains of subject handlers.

use portcullis_core::{CoreResult, RequestContext, Subject};
use portcullis_mechanisms::SubjectHandler;
use std::fmt;
use std::sync::Arc;

/// Runs subject handlers in order over a shared subject
///
/// A failing handler that allows continuation is logged and skipped; any
/// other failure is returned as is and later handlers do not run. The chain
/// succeeds once it reaches its end, even if skipped handlers failed.
#[derive(Clone, Default)]
pub struct CompositeSubjectHandler(Vec<Arc<dyn SubjectHandler>>);

impl CompositeSubjectHandler {
    /// Create a chain from handlers
    #[must_use]
    pub fn new(handlers: Vec<Arc<dyn SubjectHandler>>) -> Self {
        Self(handlers)
    }

    /// Number of handlers
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ids of the handlers, in order
    pub fn handler_ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|handler| handler.handler_id())
    }

    /// Run the chain
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing handler that does not allow
    /// continuation
    pub async fn execute(
        &self,
        ctx: &dyn RequestContext,
        subject: &mut Option<Subject>,
    ) -> CoreResult<()> {
        for handler in &self.0 {
            let Err(err) = handler.execute(ctx, subject).await else {
                continue;
            };

            if !handler.continue_on_error() {
                return Err(err);
            }

            tracing::debug!(
                id = %handler.handler_id(),
                error = %err,
                "pipeline step failed, continuing with the next one"
            );
        }

        Ok(())
    }
}

impl fmt::Debug for CompositeSubjectHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handler_ids()).finish()
    }
}
