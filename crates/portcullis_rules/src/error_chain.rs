//! Ordered error handler dispatch.

use portcullis_core::{Error, RequestContext};
use portcullis_mechanisms::{ErrorHandler, ErrorOutcome};
use std::fmt;
use std::sync::Arc;

/// Outcome produced by the handler that accepted an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    /// Id of the accepting handler
    pub handler_id: String,
    /// Outcome to send to the client
    pub outcome: ErrorOutcome,
}

/// Error handlers evaluated strictly in order
#[derive(Clone, Default)]
pub struct ErrorHandlerChain(Vec<Arc<dyn ErrorHandler>>);

impl ErrorHandlerChain {
    /// Create a chain from handlers
    #[must_use]
    pub fn new(handlers: Vec<Arc<dyn ErrorHandler>>) -> Self {
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

    /// Let the first accepting handler produce the outcome
    ///
    /// # Errors
    ///
    /// Returns `err` itself if no handler accepts it, or the failure of the
    /// accepting handler
    pub async fn handle(&self, ctx: &dyn RequestContext, err: &Error) -> Result<Handled, Error> {
        let Some(handler) = self.0.iter().find(|handler| handler.can_handle(ctx, err)) else {
            tracing::debug!(error = %err, "no error handler accepted the error");
            return Err(err.clone());
        };

        tracing::debug!(id = %handler.handler_id(), "error handler accepted the error");
        let outcome = handler.handle(ctx, err).await?;

        Ok(Handled {
            handler_id: handler.handler_id().to_string(),
            outcome,
        })
    }
}

impl fmt::Debug for ErrorHandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|handler| handler.handler_id()))
            .finish()
    }
}
