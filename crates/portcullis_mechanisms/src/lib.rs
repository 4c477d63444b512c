//! PORTCULLIS Mechanisms
//!
//! Pluggable pipeline mechanisms: authenticators establish the subject,
//! authorizers check it, finalizers mutate the response or the upstream
//! request and error handlers map failures to client-visible outcomes.
//!
//! Mechanisms are configured once as prototypes in the [`MechanismCatalog`]
//! and specialized per rule with `with_config`. Prototypes are immutable
//! and shared across rules and requests.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod authenticators;
pub mod authorizers;
pub mod catalog;
mod config;
pub mod errorhandlers;
pub mod extractors;
pub mod finalizers;
pub mod handler;

pub use catalog::{
    CatalogConfig, ErrorHandlerFactory, MechanismArgs, MechanismCatalog, MechanismDefinition,
    MechanismRegistry, SubjectHandlerFactory,
};
pub use handler::{ErrorHandler, ErrorOutcome, MechanismKind, SubjectHandler};
