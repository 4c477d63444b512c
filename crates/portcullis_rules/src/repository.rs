//! Active rule set.

use crate::factory::RuleFactory;
use crate::rule::Rule;
use crate::ruleset::RuleSet;
use arc_swap::ArcSwap;
use indexmap::IndexMap;
use portcullis_core::{CoreResult, Error};
use std::sync::Arc;

/// Immutable set of rules keyed by id
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    rules: IndexMap<String, Arc<Rule>>,
}

impl RuleSnapshot {
    /// Index rules by id
    ///
    /// # Errors
    ///
    /// Returns a configuration error on duplicate ids
    pub fn new(rules: Vec<Rule>) -> CoreResult<Self> {
        let mut indexed = IndexMap::with_capacity(rules.len());
        for rule in rules {
            let id = rule.id().to_string();
            if indexed.contains_key(&id) {
                return Err(Error::configuration(format!("duplicate rule id '{}'", id)));
            }
            indexed.insert(id, Arc::new(rule));
        }
        Ok(Self { rules: indexed })
    }

    /// Rule with this id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Rule>> {
        self.rules.get(id).map(Arc::clone)
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule ids in load order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

/// Holds the active rules and swaps them atomically on reload
///
/// Readers take the snapshot once per request; a reload never changes the
/// rules a request already started with.
#[derive(Debug, Default)]
pub struct RuleRepository {
    current: ArcSwap<RuleSnapshot>,
}

impl RuleRepository {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate a snapshot, returning the one it replaces
    pub fn replace(&self, snapshot: RuleSnapshot) -> Arc<RuleSnapshot> {
        tracing::info!(rules = snapshot.len(), "rule set activated");
        self.current.swap(Arc::new(snapshot))
    }

    /// Build and activate the rules of a rule set
    ///
    /// # Errors
    ///
    /// Returns the construction failure; the active snapshot stays in place
    pub fn load(&self, factory: &RuleFactory, rule_set: &RuleSet) -> CoreResult<()> {
        let snapshot = factory
            .create_rule_set(rule_set)
            .and_then(RuleSnapshot::new)
            .map_err(|err| {
                tracing::warn!(name = ?rule_set.name, error = %err, "rule set rejected");
                err
            })?;

        self.replace(snapshot);
        Ok(())
    }

    /// Active rule with this id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Rule>> {
        self.current.load().get(id)
    }

    /// Active snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::CompositeSubjectHandler;
    use crate::error_chain::ErrorHandlerChain;
    use crate::ruleset::RuleConfig;
    use portcullis_cache::{Cache, NoopCache};
    use portcullis_core::ErrorKind;
    use portcullis_mechanisms::{CatalogConfig, MechanismCatalog, MechanismDefinition, MechanismRegistry};
    use proptest::prelude::*;

    fn empty_rule(id: &str) -> Rule {
        Rule::new(
            id,
            CompositeSubjectHandler::default(),
            CompositeSubjectHandler::default(),
            CompositeSubjectHandler::default(),
            ErrorHandlerChain::default(),
        )
    }

    fn snapshot(ids: &[&str]) -> RuleSnapshot {
        RuleSnapshot::new(ids.iter().map(|id| empty_rule(id)).collect()).unwrap()
    }

    fn factory() -> RuleFactory {
        let config = CatalogConfig {
            authenticators: vec![MechanismDefinition::new("anon", "anonymous")],
            ..CatalogConfig::default()
        };
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        let catalog = MechanismCatalog::new(&MechanismRegistry::builtin(), &config, cache).unwrap();
        RuleFactory::new(Arc::new(catalog), None).unwrap()
    }

    fn rule_set(yaml: &str) -> RuleSet {
        let rules: Vec<RuleConfig> = serde_yaml::from_str(yaml).unwrap();
        RuleSet {
            rules,
            ..RuleSet::default()
        }
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = snapshot(&["a", "b"]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.ids().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(snapshot.get("b").unwrap().id(), "b");
        assert!(snapshot.get("c").is_none());
    }

    #[test]
    fn test_snapshot_rejects_duplicates() {
        let err = RuleSnapshot::new(vec![empty_rule("a"), empty_rule("a")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_replace_keeps_old_snapshot_for_holders() {
        let repository = RuleRepository::new();
        assert!(repository.snapshot().is_empty());

        repository.replace(snapshot(&["a"]));
        let held = repository.snapshot();
        let held_rule = repository.get("a").unwrap();

        let previous = repository.replace(snapshot(&["b"]));
        assert!(Arc::ptr_eq(&previous, &held));

        assert_eq!(held.ids().collect::<Vec<_>>(), ["a"]);
        assert_eq!(held_rule.id(), "a");
        assert!(repository.get("a").is_none());
        assert!(repository.get("b").is_some());
    }

    #[test]
    fn test_load() {
        let repository = RuleRepository::new();
        repository
            .load(&factory(), &rule_set("[{id: r1, execute: [{authenticator: anon}]}]"))
            .unwrap();
        assert_eq!(repository.snapshot().len(), 1);
        assert!(repository.get("r1").is_some());
    }

    #[test]
    fn test_failed_load_keeps_active_rules() {
        let repository = RuleRepository::new();
        let factory = factory();
        repository
            .load(&factory, &rule_set("[{id: r1, execute: [{authenticator: anon}]}]"))
            .unwrap();

        let err = repository
            .load(
                &factory,
                &rule_set("[{id: r2, execute: [{authenticator: anon}]}, {id: r3, execute: [{authenticator: missing}]}]"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(repository.get("r1").is_some());
        assert!(repository.get("r2").is_none());
    }

    proptest! {
        #[test]
        fn test_snapshot_preserves_order(ids in proptest::collection::btree_set("[a-z]{1,8}", 0..16)) {
            let ids: Vec<String> = ids.into_iter().collect();
            let rules = ids.iter().map(|id| empty_rule(id)).collect();
            let snapshot = RuleSnapshot::new(rules).unwrap();

            prop_assert_eq!(snapshot.len(), ids.len());
            prop_assert_eq!(snapshot.ids().collect::<Vec<_>>(), ids.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
