//! PORTCULLIS Core Types
//!
//! Shared vocabulary of the access-control pipeline: the error taxonomy, the
//! authenticated subject, the request context capability handed to every
//! mechanism, value templates and strict configuration decoding.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod error;
pub mod subject;
pub mod template;

// Re-exports
pub use config::{decode_config, overlay, RawConfig};
pub use context::{AppContext, DefaultContext, Mutations, Request, RequestContext};
pub use error::{CoreResult, Error, ErrorKind, ErrorSource};
pub use subject::Subject;
pub use template::{Template, TemplateError};
