//! Mechanism capabilities.
//!
//! Every configured mechanism is a *prototype*: built once from the catalog
//! definition and specialized per rule through `with_config`, which overlays
//! the rule's settings on the prototype's configuration and builds a fresh
//! instance. Prototypes are never mutated.

use async_trait::async_trait;
use http::StatusCode;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext, Subject};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Pipeline stage a mechanism can be placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MechanismKind {
    /// Establishes the subject
    Authenticator,
    /// Checks the subject against the request
    Authorizer,
    /// Mutates the response or the upstream request
    Finalizer,
    /// Turns a pipeline failure into a client-visible outcome
    ErrorHandler,
}

impl MechanismKind {
    /// Configuration name of the kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authenticator => "authenticator",
            Self::Authorizer => "authorizer",
            Self::Finalizer => "finalizer",
            Self::ErrorHandler => "error_handler",
        }
    }
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticator, authorizer or finalizer
#[async_trait]
pub trait SubjectHandler: Send + Sync {
    /// Configured id of the mechanism
    fn handler_id(&self) -> &str;

    /// Whether a failure lets the enclosing composite proceed
    fn continue_on_error(&self) -> bool {
        false
    }

    /// Run the mechanism against the request, reading or establishing the
    /// subject
    ///
    /// # Errors
    ///
    /// Returns error classified by the failure
    async fn execute(
        &self,
        ctx: &dyn RequestContext,
        subject: &mut Option<Subject>,
    ) -> CoreResult<()>;

    /// Specialize the prototype with rule-level settings
    ///
    /// Absent or empty settings return the receiver itself.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the merged settings are invalid
    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn SubjectHandler>>;
}

/// Client-visible result of handling an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorOutcome {
    /// Plain response
    Respond {
        /// Status code
        code: StatusCode,
        /// Extra response headers
        headers: BTreeMap<String, String>,
    },
    /// Redirect to another location
    Redirect {
        /// Redirect status code
        code: StatusCode,
        /// Target location
        location: String,
    },
}

impl ErrorOutcome {
    /// Status code of the outcome
    #[must_use]
    pub fn code(&self) -> StatusCode {
        match self {
            Self::Respond { code, .. } | Self::Redirect { code, .. } => *code,
        }
    }
}

/// Maps a pipeline error to an [`ErrorOutcome`]
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Configured id of the mechanism
    fn handler_id(&self) -> &str;

    /// Whether the handler's condition accepts the error
    fn can_handle(&self, ctx: &dyn RequestContext, err: &Error) -> bool;

    /// Produce the outcome for an accepted error
    ///
    /// # Errors
    ///
    /// Returns error if the outcome cannot be produced
    async fn handle(&self, ctx: &dyn RequestContext, err: &Error) -> CoreResult<ErrorOutcome>;

    /// Specialize the prototype with rule-level settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the merged settings are invalid
    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn ErrorHandler>>;
}
