//! PORTCULLIS Rules
//!
//! Rule pipeline execution. A rule runs its authenticators, authorizers and
//! finalizers in that order over a per-request subject and routes any failure
//! through its ordered error handlers. Rules are built from rule set
//! documents by specializing catalog prototypes and are served from a
//! repository that swaps whole snapshots on reload.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod composite;
pub mod error_chain;
pub mod factory;
pub mod repository;
pub mod rule;
pub mod ruleset;

pub use composite::CompositeSubjectHandler;
pub use error_chain::{ErrorHandlerChain, Handled};
pub use factory::{DefaultRuleConfig, RuleFactory};
pub use repository::{RuleRepository, RuleSnapshot};
pub use rule::{Rule, RuleError};
pub use ruleset::{
    content_type_for_path, parse_rules, ErrorStepConfig, RuleConfig, RuleSet, RuleSetError,
    StepConfig,
};
