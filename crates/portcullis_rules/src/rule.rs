//! Executable rule.

use crate::composite::CompositeSubjectHandler;
use crate::error_chain::ErrorHandlerChain;
use portcullis_core::{CoreResult, Error, ErrorKind, RequestContext, Subject};
use portcullis_mechanisms::ErrorOutcome;

/// Failed rule execution
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleError {
    /// An error handler turned the failure into an outcome
    #[error("error handled by '{handler_id}': {cause}")]
    Handled {
        /// Id of the accepting error handler
        handler_id: String,
        /// Outcome to send to the client
        outcome: ErrorOutcome,
        /// Pipeline failure that was handled
        cause: Error,
    },

    /// No error handler accepted the failure, or the accepting one failed
    #[error(transparent)]
    Unhandled(Error),
}

impl RuleError {
    /// Pipeline failure behind the result
    #[must_use]
    pub fn cause(&self) -> &Error {
        match self {
            Self::Handled { cause, .. } => cause,
            Self::Unhandled(err) => err,
        }
    }
}

/// Authenticators, authorizers, finalizers and error handlers bound to an id
#[derive(Debug)]
pub struct Rule {
    id: String,
    authenticators: CompositeSubjectHandler,
    authorizers: CompositeSubjectHandler,
    finalizers: CompositeSubjectHandler,
    error_handlers: ErrorHandlerChain,
}

impl Rule {
    /// Assemble a rule from its stages
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        authenticators: CompositeSubjectHandler,
        authorizers: CompositeSubjectHandler,
        finalizers: CompositeSubjectHandler,
        error_handlers: ErrorHandlerChain,
    ) -> Self {
        Self {
            id: id.into(),
            authenticators,
            authorizers,
            finalizers,
            error_handlers,
        }
    }

    /// Rule id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Authenticator stage
    #[must_use]
    pub fn authenticators(&self) -> &CompositeSubjectHandler {
        &self.authenticators
    }

    /// Authorizer stage
    #[must_use]
    pub fn authorizers(&self) -> &CompositeSubjectHandler {
        &self.authorizers
    }

    /// Finalizer stage
    #[must_use]
    pub fn finalizers(&self) -> &CompositeSubjectHandler {
        &self.finalizers
    }

    /// Error handlers
    #[must_use]
    pub fn error_handlers(&self) -> &ErrorHandlerChain {
        &self.error_handlers
    }

    /// Run the pipeline for one request
    ///
    /// Each call starts without a subject. Failures of any stage, including
    /// cancellation, are routed through the error handlers.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::Handled`] if an error handler produced an outcome
    /// and [`RuleError::Unhandled`] otherwise
    pub async fn execute(&self, ctx: &dyn RequestContext) -> Result<(), RuleError> {
        tracing::debug!(rule = %self.id, "executing rule");

        let mut subject = None;
        let Err(err) = self.run_stages(ctx, &mut subject).await else {
            return Ok(());
        };

        if err.is(ErrorKind::Internal) {
            tracing::error!(rule = %self.id, handler = ?err.handler_id(), error = %err, "rule execution failed");
        } else {
            tracing::info!(rule = %self.id, handler = ?err.handler_id(), error = %err, "rule execution failed");
        }

        match self.error_handlers.handle(ctx, &err).await {
            Ok(handled) => Err(RuleError::Handled {
                handler_id: handled.handler_id,
                outcome: handled.outcome,
                cause: err,
            }),
            Err(unhandled) => Err(RuleError::Unhandled(unhandled)),
        }
    }

    async fn run_stages(
        &self,
        ctx: &dyn RequestContext,
        subject: &mut Option<Subject>,
    ) -> CoreResult<()> {
        let app = ctx.app_context();
        for stage in [&self.authenticators, &self.authorizers, &self.finalizers] {
            app.check()?;
            app.run(stage.execute(ctx, subject)).await?;
        }
        Ok(())
    }
}
