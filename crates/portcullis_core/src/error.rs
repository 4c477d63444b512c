//! Pipeline error taxonomy.
//!
//! Every failure that crosses a mechanism boundary is an [`Error`] carrying an
//! [`ErrorKind`]. Kinds are matched by classification, not identity: an
//! [`ErrorKind::AuthenticationData`] error *is* an authentication error, and an
//! [`ErrorKind::CommunicationTimeout`] error *is* a communication error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Core result type
pub type CoreResult<T> = Result<T, Error>;

/// Shared, type-erased cause of an [`Error`]
pub type ErrorSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of a pipeline error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or missing configuration. Fatal at build time.
    #[serde(rename = "configuration_error")]
    Configuration,

    /// Authentication failed
    #[serde(rename = "authentication_error")]
    Authentication,

    /// Expected authentication material is absent from the request
    #[serde(rename = "authentication_data_error")]
    AuthenticationData,

    /// Authorization failed
    #[serde(rename = "authorization_error")]
    Authorization,

    /// Communication with a remote system failed
    #[serde(rename = "communication_error")]
    Communication,

    /// Communication with a remote system timed out
    #[serde(rename = "communication_timeout_error")]
    CommunicationTimeout,

    /// Request does not satisfy a precondition
    #[serde(rename = "precondition_error")]
    Precondition,

    /// Programming invariant violated or unexpected failure
    #[serde(rename = "internal_error")]
    Internal,

    /// Request was canceled or ran past its deadline
    #[serde(rename = "canceled_error")]
    Canceled,
}

impl ErrorKind {
    /// All kinds, in declaration order
    pub const ALL: [ErrorKind; 9] = [
        Self::Configuration,
        Self::Authentication,
        Self::AuthenticationData,
        Self::Authorization,
        Self::Communication,
        Self::CommunicationTimeout,
        Self::Precondition,
        Self::Internal,
        Self::Canceled,
    ];

    /// The broader kind this kind is a specialization of
    #[must_use]
    pub fn parent(self) -> Option<ErrorKind> {
        match self {
            Self::AuthenticationData => Some(Self::Authentication),
            Self::CommunicationTimeout => Some(Self::Communication),
            _ => None,
        }
    }

    /// Check whether this kind is `other` or a specialization of it
    #[must_use]
    pub fn is(self, other: ErrorKind) -> bool {
        self == other || self.parent().is_some_and(|parent| parent.is(other))
    }

    /// Configuration name of the kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration_error",
            Self::Authentication => "authentication_error",
            Self::AuthenticationData => "authentication_data_error",
            Self::Authorization => "authorization_error",
            Self::Communication => "communication_error",
            Self::CommunicationTimeout => "communication_timeout_error",
            Self::Precondition => "precondition_error",
            Self::Internal => "internal_error",
            Self::Canceled => "canceled_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised while building or executing the pipeline
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    handler_id: Option<String>,
    source: Option<ErrorSource>,
}

impl Error {
    /// Create a new error of the given kind
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            handler_id: None,
            source: None,
        }
    }

    /// Configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Authentication error
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Missing authentication data
    #[must_use]
    pub fn authentication_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthenticationData, message)
    }

    /// Authorization error
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    /// Communication error
    #[must_use]
    pub fn communication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Communication, message)
    }

    /// Precondition error
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Precondition, message)
    }

    /// Internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Canceled request
    #[must_use]
    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Canceled, message)
    }

    /// Attribute the error to a mechanism
    #[must_use]
    pub fn with_handler_id(mut self, id: impl Into<String>) -> Self {
        self.handler_id = Some(id.into());
        self
    }

    /// Attach the underlying cause
    #[must_use]
    pub fn caused_by<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(cause));
        self
    }

    /// Error classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human readable message without the cause
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Id of the mechanism the error is attributed to
    #[must_use]
    pub fn handler_id(&self) -> Option<&str> {
        self.handler_id.as_deref()
    }

    /// Check the classification, see [`ErrorKind::is`]
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind.is(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn std::error::Error + 'static))
    }
}
