//! PORTCULLIS Policy
//!
//! Declarative conditions that decide whether an error handler applies to
//! a failed request: error classification, client network and request
//! header predicates, combined as an OR of ANDs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod condition;
pub mod matcher;

pub use condition::{ErrorCondition, ErrorConditionMatcher};
pub use matcher::{CidrMatcher, ErrorTypeMatcher, HeaderMatcher};
