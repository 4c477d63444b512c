//! Mechanism registry and prototype catalog.
//!
//! The registry maps mechanism type names to factories. The catalog turns
//! the configured mechanism definitions into shared prototypes, built
//! eagerly so configuration errors surface at startup.

use crate::authenticators::{
    AnonymousAuthenticator, ApiKeyAuthenticator, BasicAuthAuthenticator, NoopAuthenticator,
    UnauthorizedAuthenticator,
};
use crate::authorizers::{AttributesAuthorizer, FixedAuthorizer};
use crate::errorhandlers::{RedirectErrorHandler, RespondErrorHandler, WwwAuthenticateErrorHandler};
use crate::finalizers::{CookieFinalizer, HeaderFinalizer, NoopFinalizer};
use crate::handler::{ErrorHandler, MechanismKind, SubjectHandler};
use indexmap::IndexMap;
use portcullis_cache::Cache;
use portcullis_core::{CoreResult, Error, RawConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input handed to mechanism factories
pub struct MechanismArgs<'a> {
    /// Configured mechanism id
    pub id: &'a str,
    /// Whether failures let the enclosing composite proceed
    pub continue_on_error: bool,
    /// Mechanism settings
    pub config: Option<&'a RawConfig>,
    /// Shared cache
    pub cache: &'a Arc<dyn Cache>,
}

/// Builds authenticators, authorizers and finalizers
pub type SubjectHandlerFactory =
    Arc<dyn Fn(&MechanismArgs<'_>) -> CoreResult<Arc<dyn SubjectHandler>> + Send + Sync>;

/// Builds error handlers
pub type ErrorHandlerFactory =
    Arc<dyn Fn(&MechanismArgs<'_>) -> CoreResult<Arc<dyn ErrorHandler>> + Send + Sync>;

/// Known mechanism types per kind
#[derive(Clone, Default)]
pub struct MechanismRegistry {
    subject_handlers: IndexMap<(MechanismKind, String), SubjectHandlerFactory>,
    error_handlers: IndexMap<String, ErrorHandlerFactory>,
}

fn subject_factory<T, F>(build: F) -> SubjectHandlerFactory
where
    T: SubjectHandler + 'static,
    F: Fn(&MechanismArgs<'_>) -> CoreResult<T> + Send + Sync + 'static,
{
    Arc::new(move |args: &MechanismArgs<'_>| Ok(Arc::new(build(args)?) as Arc<dyn SubjectHandler>))
}

fn error_factory<T, F>(build: F) -> ErrorHandlerFactory
where
    T: ErrorHandler + 'static,
    F: Fn(&MechanismArgs<'_>) -> CoreResult<T> + Send + Sync + 'static,
{
    Arc::new(move |args: &MechanismArgs<'_>| Ok(Arc::new(build(args)?) as Arc<dyn ErrorHandler>))
}

impl MechanismRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in mechanism type
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_authenticator("noop", subject_factory(NoopAuthenticator::new))
            .with_authenticator("anonymous", subject_factory(AnonymousAuthenticator::new))
            .with_authenticator("unauthorized", subject_factory(UnauthorizedAuthenticator::new))
            .with_authenticator("basic_auth", subject_factory(BasicAuthAuthenticator::new))
            .with_authenticator("api_key", subject_factory(ApiKeyAuthenticator::new))
            .with_authorizer("allow", subject_factory(FixedAuthorizer::allow))
            .with_authorizer("deny", subject_factory(FixedAuthorizer::deny))
            .with_authorizer("attributes", subject_factory(AttributesAuthorizer::new))
            .with_finalizer("noop", subject_factory(NoopFinalizer::new))
            .with_finalizer("cookie", subject_factory(CookieFinalizer::new))
            .with_finalizer("header", subject_factory(HeaderFinalizer::new))
            .with_error_handler("respond", error_factory(RespondErrorHandler::new))
            .with_error_handler("redirect", error_factory(RedirectErrorHandler::new))
            .with_error_handler("www_authenticate", error_factory(WwwAuthenticateErrorHandler::new))
    }

    /// Register an authenticator type, replacing any previous factory
    pub fn register_authenticator(&mut self, type_name: impl Into<String>, factory: SubjectHandlerFactory) {
        self.subject_handlers
            .insert((MechanismKind::Authenticator, type_name.into()), factory);
    }

    /// Register an authorizer type, replacing any previous factory
    pub fn register_authorizer(&mut self, type_name: impl Into<String>, factory: SubjectHandlerFactory) {
        self.subject_handlers
            .insert((MechanismKind::Authorizer, type_name.into()), factory);
    }

    /// Register a finalizer type, replacing any previous factory
    pub fn register_finalizer(&mut self, type_name: impl Into<String>, factory: SubjectHandlerFactory) {
        self.subject_handlers
            .insert((MechanismKind::Finalizer, type_name.into()), factory);
    }

    /// Register an error handler type, replacing any previous factory
    pub fn register_error_handler(&mut self, type_name: impl Into<String>, factory: ErrorHandlerFactory) {
        self.error_handlers.insert(type_name.into(), factory);
    }

    /// Builder form of [`Self::register_authenticator`]
    #[must_use]
    pub fn with_authenticator(mut self, type_name: impl Into<String>, factory: SubjectHandlerFactory) -> Self {
        self.register_authenticator(type_name, factory);
        self
    }

    /// Builder form of [`Self::register_authorizer`]
    #[must_use]
    pub fn with_authorizer(mut self, type_name: impl Into<String>, factory: SubjectHandlerFactory) -> Self {
        self.register_authorizer(type_name, factory);
        self
    }

    /// Builder form of [`Self::register_finalizer`]
    #[must_use]
    pub fn with_finalizer(mut self, type_name: impl Into<String>, factory: SubjectHandlerFactory) -> Self {
        self.register_finalizer(type_name, factory);
        self
    }

    /// Builder form of [`Self::register_error_handler`]
    #[must_use]
    pub fn with_error_handler(mut self, type_name: impl Into<String>, factory: ErrorHandlerFactory) -> Self {
        self.register_error_handler(type_name, factory);
        self
    }

    /// Registered type names of a kind, in registration order
    #[must_use]
    pub fn types(&self, kind: MechanismKind) -> Vec<&str> {
        if kind == MechanismKind::ErrorHandler {
            return self.error_handlers.keys().map(String::as_str).collect();
        }

        self.subject_handlers
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    fn subject_handler(&self, kind: MechanismKind, type_name: &str) -> Option<&SubjectHandlerFactory> {
        self.subject_handlers.get(&(kind, type_name.to_string()))
    }

    fn error_handler(&self, type_name: &str) -> Option<&ErrorHandlerFactory> {
        self.error_handlers.get(type_name)
    }
}

/// Configured mechanism
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MechanismDefinition {
    /// Unique id within the kind
    pub id: String,
    /// Registered type name
    #[serde(rename = "type")]
    pub mechanism_type: String,
    /// Whether failures let the enclosing composite proceed
    #[serde(default)]
    pub continue_on_error: bool,
    /// Type specific settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RawConfig>,
}

impl MechanismDefinition {
    /// Create a definition without settings
    #[must_use]
    pub fn new(id: impl Into<String>, mechanism_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mechanism_type: mechanism_type.into(),
            continue_on_error: false,
            config: None,
        }
    }

    /// Set the continue-on-error flag
    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Set the settings
    #[must_use]
    pub fn with_config(mut self, config: RawConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// Mechanism definitions per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Authenticator definitions
    #[serde(default)]
    pub authenticators: Vec<MechanismDefinition>,
    /// Authorizer definitions
    #[serde(default)]
    pub authorizers: Vec<MechanismDefinition>,
    /// Finalizer definitions
    #[serde(default)]
    pub finalizers: Vec<MechanismDefinition>,
    /// Error handler definitions
    #[serde(default)]
    pub error_handlers: Vec<MechanismDefinition>,
}

/// Immutable set of mechanism prototypes, looked up by id
pub struct MechanismCatalog {
    authenticators: IndexMap<String, Arc<dyn SubjectHandler>>,
    authorizers: IndexMap<String, Arc<dyn SubjectHandler>>,
    finalizers: IndexMap<String, Arc<dyn SubjectHandler>>,
    error_handlers: IndexMap<String, Arc<dyn ErrorHandler>>,
}

impl MechanismCatalog {
    /// Build every configured prototype
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown types, duplicate or empty
    /// ids and invalid settings
    pub fn new(
        registry: &MechanismRegistry,
        config: &CatalogConfig,
        cache: Arc<dyn Cache>,
    ) -> CoreResult<Self> {
        let catalog = Self {
            authenticators: build_subject_handlers(
                registry,
                MechanismKind::Authenticator,
                &config.authenticators,
                &cache,
            )?,
            authorizers: build_subject_handlers(
                registry,
                MechanismKind::Authorizer,
                &config.authorizers,
                &cache,
            )?,
            finalizers: build_subject_handlers(
                registry,
                MechanismKind::Finalizer,
                &config.finalizers,
                &cache,
            )?,
            error_handlers: build_error_handlers(registry, &config.error_handlers, &cache)?,
        };

        tracing::info!(
            authenticators = catalog.authenticators.len(),
            authorizers = catalog.authorizers.len(),
            finalizers = catalog.finalizers.len(),
            error_handlers = catalog.error_handlers.len(),
            "mechanism catalog loaded"
        );

        Ok(catalog)
    }

    /// Authenticator prototype
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no authenticator has this id
    pub fn authenticator(&self, id: &str) -> CoreResult<Arc<dyn SubjectHandler>> {
        lookup(&self.authenticators, MechanismKind::Authenticator, id)
    }

    /// Authorizer prototype
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no authorizer has this id
    pub fn authorizer(&self, id: &str) -> CoreResult<Arc<dyn SubjectHandler>> {
        lookup(&self.authorizers, MechanismKind::Authorizer, id)
    }

    /// Finalizer prototype
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no finalizer has this id
    pub fn finalizer(&self, id: &str) -> CoreResult<Arc<dyn SubjectHandler>> {
        lookup(&self.finalizers, MechanismKind::Finalizer, id)
    }

    /// Error handler prototype
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no error handler has this id
    pub fn error_handler(&self, id: &str) -> CoreResult<Arc<dyn ErrorHandler>> {
        lookup(&self.error_handlers, MechanismKind::ErrorHandler, id)
    }

    /// Number of prototypes of a kind
    #[must_use]
    pub fn count(&self, kind: MechanismKind) -> usize {
        match kind {
            MechanismKind::Authenticator => self.authenticators.len(),
            MechanismKind::Authorizer => self.authorizers.len(),
            MechanismKind::Finalizer => self.finalizers.len(),
            MechanismKind::ErrorHandler => self.error_handlers.len(),
        }
    }
}

fn lookup<T: ?Sized>(map: &IndexMap<String, Arc<T>>, kind: MechanismKind, id: &str) -> CoreResult<Arc<T>> {
    map.get(id)
        .map(Arc::clone)
        .ok_or_else(|| Error::configuration(format!("no {} with id '{}' defined", kind, id)))
}

fn check_id<T: ?Sized>(map: &IndexMap<String, Arc<T>>, kind: MechanismKind, id: &str) -> CoreResult<()> {
    if id.is_empty() {
        return Err(Error::configuration(format!("{} definition without id", kind)));
    }
    if map.contains_key(id) {
        return Err(Error::configuration(format!("duplicate {} id '{}'", kind, id)));
    }
    Ok(())
}

fn unknown_type(kind: MechanismKind, definition: &MechanismDefinition) -> Error {
    Error::configuration(format!(
        "unsupported {} type '{}'",
        kind, definition.mechanism_type
    ))
    .with_handler_id(&definition.id)
}

fn build_subject_handlers(
    registry: &MechanismRegistry,
    kind: MechanismKind,
    definitions: &[MechanismDefinition],
    cache: &Arc<dyn Cache>,
) -> CoreResult<IndexMap<String, Arc<dyn SubjectHandler>>> {
    let mut handlers = IndexMap::with_capacity(definitions.len());

    for definition in definitions {
        check_id(&handlers, kind, &definition.id)?;
        let factory = registry
            .subject_handler(kind, &definition.mechanism_type)
            .ok_or_else(|| unknown_type(kind, definition))?;

        let handler = factory(&MechanismArgs {
            id: &definition.id,
            continue_on_error: definition.continue_on_error,
            config: definition.config.as_ref(),
            cache,
        })?;

        tracing::debug!(%kind, id = %definition.id, mechanism_type = %definition.mechanism_type, "mechanism prototype created");
        handlers.insert(definition.id.clone(), handler);
    }

    Ok(handlers)
}

fn build_error_handlers(
    registry: &MechanismRegistry,
    definitions: &[MechanismDefinition],
    cache: &Arc<dyn Cache>,
) -> CoreResult<IndexMap<String, Arc<dyn ErrorHandler>>> {
    let kind = MechanismKind::ErrorHandler;
    let mut handlers = IndexMap::with_capacity(definitions.len());

    for definition in definitions {
        check_id(&handlers, kind, &definition.id)?;
        if definition.continue_on_error {
            return Err(Error::configuration("continue_on_error is not supported by error handlers")
                .with_handler_id(&definition.id));
        }

        let factory = registry
            .error_handler(&definition.mechanism_type)
            .ok_or_else(|| unknown_type(kind, definition))?;

        let handler = factory(&MechanismArgs {
            id: &definition.id,
            continue_on_error: false,
            config: definition.config.as_ref(),
            cache,
        })?;

        tracing::debug!(%kind, id = %definition.id, mechanism_type = %definition.mechanism_type, "mechanism prototype created");
        handlers.insert(definition.id.clone(), handler);
    }

    Ok(handlers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ErrorOutcome;
    use async_trait::async_trait;
    use portcullis_cache::NoopCache;
    use portcullis_core::{ErrorKind, RequestContext, Subject};

    fn cache() -> Arc<dyn Cache> {
        Arc::new(NoopCache)
    }

    fn catalog_config(yaml: &str) -> CatalogConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_builtin_types() {
        let registry = MechanismRegistry::builtin();
        assert_eq!(
            registry.types(MechanismKind::Authenticator),
            vec!["noop", "anonymous", "unauthorized", "basic_auth", "api_key"]
        );
        assert_eq!(
            registry.types(MechanismKind::Authorizer),
            vec!["allow", "deny", "attributes"]
        );
        assert_eq!(
            registry.types(MechanismKind::Finalizer),
            vec!["noop", "cookie", "header"]
        );
        assert_eq!(
            registry.types(MechanismKind::ErrorHandler),
            vec!["respond", "redirect", "www_authenticate"]
        );
    }

    #[test]
    fn test_catalog_lookup() {
        let config = catalog_config(
            r#"
authenticators:
  - id: anon
    type: anonymous
  - id: basic
    type: basic_auth
    continue_on_error: true
    config:
      user_id: alice
      password: secret
authorizers:
  - id: allow_all
    type: allow
finalizers:
  - id: cookies
    type: cookie
    config:
      cookies:
        user: "{{ .ID }}"
error_handlers:
  - id: default
    type: respond
"#,
        );
        let catalog = MechanismCatalog::new(&MechanismRegistry::builtin(), &config, cache()).unwrap();

        assert_eq!(catalog.count(MechanismKind::Authenticator), 2);
        assert!(catalog.authenticator("basic").unwrap().continue_on_error());
        assert!(!catalog.authenticator("anon").unwrap().continue_on_error());
        assert_eq!(catalog.authorizer("allow_all").unwrap().handler_id(), "allow_all");
        assert_eq!(catalog.finalizer("cookies").unwrap().handler_id(), "cookies");
        assert_eq!(catalog.error_handler("default").unwrap().handler_id(), "default");

        let err = catalog.authenticator("allow_all").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("'allow_all'"));
    }

    #[test]
    fn test_prototypes_are_shared() {
        let config = catalog_config("authenticators: [{id: anon, type: anonymous}]");
        let catalog = MechanismCatalog::new(&MechanismRegistry::builtin(), &config, cache()).unwrap();

        let first = catalog.authenticator("anon").unwrap();
        let second = catalog.authenticator("anon").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_catalog_errors() {
        for yaml in [
            "authenticators: [{id: a, type: kerberos}]",
            "authenticators: [{id: a, type: anonymous}, {id: a, type: noop}]",
            "authenticators: [{id: '', type: anonymous}]",
            "authorizers: [{id: a, type: anonymous}]",
            "finalizers: [{id: f, type: cookie}]",
            "error_handlers: [{id: e, type: respond, continue_on_error: true}]",
            "error_handlers: [{id: e, type: redirect, config: {to: 'https://example.com'}}]",
        ] {
            let result = MechanismCatalog::new(&MechanismRegistry::builtin(), &catalog_config(yaml), cache());
            let err = result.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{}", yaml);
        }
    }

    #[test]
    fn test_same_id_in_different_kinds() {
        let config = catalog_config(
            "authenticators: [{id: noop, type: noop}]\nfinalizers: [{id: noop, type: noop}]",
        );
        assert!(MechanismCatalog::new(&MechanismRegistry::builtin(), &config, cache()).is_ok());
    }

    #[test]
    fn test_definition_rejects_unknown_fields() {
        let result: Result<CatalogConfig, _> =
            serde_yaml::from_str("authenticators: [{id: a, type: noop, cfg: {}}]");
        assert!(result.is_err());
    }

    struct HeaderPresent {
        id: String,
    }

    #[async_trait]
    impl SubjectHandler for HeaderPresent {
        fn handler_id(&self) -> &str {
            &self.id
        }

        async fn execute(
            &self,
            _ctx: &dyn RequestContext,
            subject: &mut Option<Subject>,
        ) -> CoreResult<()> {
            *subject = Some(Subject::new("custom"));
            Ok(())
        }

        fn with_config(self: Arc<Self>, _config: Option<&RawConfig>) -> CoreResult<Arc<dyn SubjectHandler>> {
            Ok(self)
        }
    }

    struct Teapot;

    #[async_trait]
    impl ErrorHandler for Teapot {
        fn handler_id(&self) -> &str {
            "teapot"
        }

        fn can_handle(&self, _ctx: &dyn RequestContext, _err: &Error) -> bool {
            true
        }

        async fn handle(&self, _ctx: &dyn RequestContext, _err: &Error) -> CoreResult<ErrorOutcome> {
            Ok(ErrorOutcome::Respond {
                code: http::StatusCode::IM_A_TEAPOT,
                headers: Default::default(),
            })
        }

        fn with_config(self: Arc<Self>, _config: Option<&RawConfig>) -> CoreResult<Arc<dyn ErrorHandler>> {
            Ok(self)
        }
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = MechanismRegistry::builtin();
        registry.register_authenticator(
            "custom",
            Arc::new(|args: &MechanismArgs<'_>| {
                Ok(Arc::new(HeaderPresent { id: args.id.to_string() }) as Arc<dyn SubjectHandler>)
            }),
        );
        registry.register_error_handler(
            "teapot",
            Arc::new(|_: &MechanismArgs<'_>| Ok(Arc::new(Teapot) as Arc<dyn ErrorHandler>)),
        );

        let config = catalog_config(
            "authenticators: [{id: mine, type: custom}]\nerror_handlers: [{id: tea, type: teapot}]",
        );
        let catalog = MechanismCatalog::new(&registry, &config, cache()).unwrap();
        assert_eq!(catalog.authenticator("mine").unwrap().handler_id(), "mine");
        assert!(catalog.error_handler("tea").is_ok());
    }
}
