//! Rule construction from rule set documents.

use crate::composite::CompositeSubjectHandler;
use crate::error_chain::ErrorHandlerChain;
use crate::rule::Rule;
use crate::ruleset::{ErrorStepConfig, RuleConfig, RuleSet, StepConfig};
use portcullis_core::{CoreResult, Error};
use portcullis_mechanisms::{ErrorHandler, MechanismCatalog, MechanismKind, SubjectHandler};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stages applied to rules that leave them out
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultRuleConfig {
    /// Pipeline steps in execution order
    #[serde(default)]
    pub execute: Vec<StepConfig>,
    /// Error handlers in evaluation order
    #[serde(default)]
    pub on_error: Vec<ErrorStepConfig>,
}

#[derive(Default)]
struct Stages {
    authenticators: Vec<Arc<dyn SubjectHandler>>,
    authorizers: Vec<Arc<dyn SubjectHandler>>,
    finalizers: Vec<Arc<dyn SubjectHandler>>,
}

/// Builds rules by specializing catalog prototypes
pub struct RuleFactory {
    catalog: Arc<MechanismCatalog>,
    defaults: Stages,
    default_error_handlers: Vec<Arc<dyn ErrorHandler>>,
}

impl RuleFactory {
    /// Create a factory, resolving the default rule up front
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the default rule references unknown
    /// mechanisms, orders its stages wrongly or carries invalid overlays
    pub fn new(catalog: Arc<MechanismCatalog>, default_rule: Option<&DefaultRuleConfig>) -> CoreResult<Self> {
        let (defaults, default_error_handlers) = match default_rule {
            Some(rule) => {
                let wrap = |err: Error| {
                    Error::new(err.kind(), "failed to load default rule").caused_by(err)
                };
                (
                    build_stages(&catalog, &rule.execute).map_err(wrap)?,
                    build_error_handlers(&catalog, &rule.on_error).map_err(wrap)?,
                )
            }
            None => (Stages::default(), Vec::new()),
        };

        Ok(Self {
            catalog,
            defaults,
            default_error_handlers,
        })
    }

    /// Whether a default rule with at least one step was configured
    #[must_use]
    pub fn has_default_rule(&self) -> bool {
        !(self.defaults.authenticators.is_empty()
            && self.defaults.authorizers.is_empty()
            && self.defaults.finalizers.is_empty())
    }

    /// Build one rule
    ///
    /// Stages and error handlers the rule leaves out are taken from the
    /// default rule.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the rule if a step references an
    /// unknown mechanism, stages are out of order, an overlay is invalid or
    /// the rule ends up without an authenticator
    pub fn create_rule(&self, config: &RuleConfig) -> CoreResult<Rule> {
        self.build_rule(config).map_err(|err| {
            Error::new(err.kind(), format!("failed to create rule '{}'", config.id)).caused_by(err)
        })
    }

    /// Build every rule of a rule set, in document order
    ///
    /// # Errors
    ///
    /// Returns the first rule construction failure
    pub fn create_rule_set(&self, rule_set: &RuleSet) -> CoreResult<Vec<Rule>> {
        rule_set.validate()?;
        rule_set.rules.iter().map(|rule| self.create_rule(rule)).collect()
    }

    fn build_rule(&self, config: &RuleConfig) -> CoreResult<Rule> {
        let stages = build_stages(&self.catalog, &config.execute)?;
        let mut error_handlers = build_error_handlers(&self.catalog, &config.on_error)?;

        let authenticators = or_default(stages.authenticators, &self.defaults.authenticators);
        let authorizers = or_default(stages.authorizers, &self.defaults.authorizers);
        let finalizers = or_default(stages.finalizers, &self.defaults.finalizers);
        if error_handlers.is_empty() {
            error_handlers = self.default_error_handlers.clone();
        }

        if authenticators.is_empty() {
            return Err(Error::configuration("no authenticator defined"));
        }

        tracing::debug!(
            rule = %config.id,
            authenticators = authenticators.len(),
            authorizers = authorizers.len(),
            finalizers = finalizers.len(),
            error_handlers = error_handlers.len(),
            "rule created"
        );

        Ok(Rule::new(
            config.id.clone(),
            CompositeSubjectHandler::new(authenticators),
            CompositeSubjectHandler::new(authorizers),
            CompositeSubjectHandler::new(finalizers),
            ErrorHandlerChain::new(error_handlers),
        ))
    }
}

fn or_default(
    handlers: Vec<Arc<dyn SubjectHandler>>,
    defaults: &[Arc<dyn SubjectHandler>],
) -> Vec<Arc<dyn SubjectHandler>> {
    if handlers.is_empty() {
        defaults.to_vec()
    } else {
        handlers
    }
}

fn build_stages(catalog: &MechanismCatalog, steps: &[StepConfig]) -> CoreResult<Stages> {
    let mut stages = Stages::default();
    let mut current = MechanismKind::Authenticator;

    for step in steps {
        if step.kind < current {
            return Err(Error::configuration(format!(
                "{} '{}' is defined after a {}",
                step.kind, step.id, current
            )));
        }
        current = step.kind;

        let config = step.config.as_ref();
        match step.kind {
            MechanismKind::Authenticator => stages
                .authenticators
                .push(catalog.authenticator(&step.id)?.with_config(config)?),
            MechanismKind::Authorizer => stages
                .authorizers
                .push(catalog.authorizer(&step.id)?.with_config(config)?),
            MechanismKind::Finalizer => stages
                .finalizers
                .push(catalog.finalizer(&step.id)?.with_config(config)?),
            MechanismKind::ErrorHandler => {
                return Err(Error::configuration(format!(
                    "error handler '{}' must be referenced in on_error",
                    step.id
                )))
            }
        }
    }

    Ok(stages)
}

fn build_error_handlers(
    catalog: &MechanismCatalog,
    steps: &[ErrorStepConfig],
) -> CoreResult<Vec<Arc<dyn ErrorHandler>>> {
    steps
        .iter()
        .map(|step| {
            catalog
                .error_handler(&step.error_handler)?
                .with_config(step.config.as_ref())
        })
        .collect()
}
