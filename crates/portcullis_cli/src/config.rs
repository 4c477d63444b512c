//! Gateway configuration.

use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use http::StatusCode;
use portcullis_cache::CacheConfig;
use portcullis_core::ErrorKind;
use portcullis_mechanisms::{CatalogConfig, MechanismCatalog, MechanismRegistry};
use portcullis_rules::{content_type_for_path, parse_rules, DefaultRuleConfig, RuleFactory, RuleRepository, RuleSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Level or filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

/// Status codes for errors no error handler accepted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseCodes(BTreeMap<ErrorKind, u16>);

impl ResponseCodes {
    /// Fallback status for an error kind
    ///
    /// Configured codes win over defaults; a kind without a configured code
    /// inherits the one of its parent kind.
    #[must_use]
    pub fn code_for(&self, kind: ErrorKind) -> StatusCode {
        let mut current = Some(kind);
        while let Some(kind) = current {
            if let Some(code) = self.0.get(&kind).and_then(|code| StatusCode::from_u16(*code).ok()) {
                return code;
            }
            current = kind.parent();
        }
        default_code(kind)
    }

    fn validate(&self) -> Result<()> {
        for (kind, code) in &self.0 {
            if !(100..=599).contains(code) {
                bail!("invalid response code {} for {}", code, kind.as_str());
            }
        }
        Ok(())
    }
}

fn default_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Authentication | ErrorKind::AuthenticationData => StatusCode::UNAUTHORIZED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Communication => StatusCode::BAD_GATEWAY,
        ErrorKind::CommunicationTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Precondition => StatusCode::BAD_REQUEST,
        ErrorKind::Canceled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Rule set source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    /// Rule set file, relative paths resolve against the configuration file
    pub src: PathBuf,
}

/// Contents of `portcullis.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Logging
    #[serde(default)]
    pub log: LogConfig,
    /// Cache backend shared by mechanisms
    #[serde(default)]
    pub cache: CacheConfig,
    /// Fallback status codes
    #[serde(default)]
    pub responses: ResponseCodes,
    /// Rule set source
    pub rules: RulesConfig,
    /// Mechanism prototypes
    #[serde(default)]
    pub mechanisms: CatalogConfig,
    /// Stages for rules that leave them out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rule: Option<DefaultRuleConfig>,
}

impl GatewayConfig {
    /// Read and check a configuration file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a valid configuration
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read configuration {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration {}", path.display()))?;

        config.responses.validate()?;
        if config.rules.src.is_relative() {
            if let Some(dir) = path.parent() {
                config.rules.src = dir.join(&config.rules.src);
            }
        }

        Ok(config)
    }

    /// Read the configured rule set
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, has no known extension or
    /// holds no valid rule set
    pub fn load_rules(&self) -> Result<RuleSet> {
        let path = &self.rules.src;
        let content_type = content_type_for_path(path)
            .ok_or_else(|| eyre!("unsupported rule set file {}", path.display()))?;
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open rule set {}", path.display()))?;

        parse_rules(content_type, file)
            .wrap_err_with(|| format!("failed to load rule set {}", path.display()))
    }
}

/// Catalog, rule factory and active rules built from a configuration
pub struct Gateway {
    config: GatewayConfig,
    catalog: Arc<MechanismCatalog>,
    factory: RuleFactory,
    repository: RuleRepository,
}

impl Gateway {
    /// Build every mechanism and load the rule set
    ///
    /// # Errors
    ///
    /// Returns the first configuration error
    pub fn build(config: GatewayConfig) -> Result<Self> {
        let cache = config.cache.build();
        let catalog = MechanismCatalog::new(&MechanismRegistry::builtin(), &config.mechanisms, cache)
            .wrap_err("failed to load mechanisms")?;
        let catalog = Arc::new(catalog);
        let factory = RuleFactory::new(Arc::clone(&catalog), config.default_rule.as_ref())?;

        let gateway = Self {
            config,
            catalog,
            factory,
            repository: RuleRepository::new(),
        };
        gateway.reload_rules()?;

        Ok(gateway)
    }

    /// Re-read the rule set and swap it in
    ///
    /// # Errors
    ///
    /// Returns error if the rule set cannot be loaded; active rules stay in
    /// place then
    pub fn reload_rules(&self) -> Result<()> {
        let rule_set = self.config.load_rules()?;
        self.repository.load(&self.factory, &rule_set)?;
        Ok(())
    }

    /// Configuration the gateway was built from
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Mechanism prototypes
    #[must_use]
    pub fn catalog(&self) -> &MechanismCatalog {
        &self.catalog
    }

    /// Active rules
    #[must_use]
    pub fn rules(&self) -> &RuleRepository {
        &self.repository
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_cache::CacheType;
    use portcullis_mechanisms::MechanismKind;

    fn write_gateway(dir: &Path, rules: &str) -> PathBuf {
        fs::write(dir.join("rules.yaml"), rules).unwrap();
        let path = dir.join("portcullis.yaml");
        fs::write(
            &path,
            r#"
log:
  level: debug
  format: json
cache:
  type: noop
responses:
  authorization_error: 404
rules:
  src: rules.yaml
mechanisms:
  authenticators:
    - id: anon
      type: anonymous
  authorizers:
    - id: deny_all
      type: deny
default_rule:
  execute:
    - authenticator: anon
"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gateway(dir.path(), "rules: [{id: r1}]");

        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.cache.cache_type, CacheType::Noop);
        assert_eq!(config.rules.src, dir.path().join("rules.yaml"));
        assert_eq!(config.mechanisms.authenticators.len(), 1);
        assert!(config.default_rule.is_some());
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: GatewayConfig = serde_yaml::from_str("rules: {src: /etc/rules.yaml}").unwrap();
        assert_eq!(config.log, LogConfig::default());
        assert_eq!(config.log.level, "info");
        assert_eq!(config.cache.cache_type, CacheType::Memory);
        assert!(config.default_rule.is_none());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_yaml::from_str::<GatewayConfig>("rules: {src: r.yaml}\nlogging: {}").is_err());
        assert!(serde_yaml::from_str::<GatewayConfig>("rules: {src: r.yaml, watch: true}").is_err());
        assert!(serde_yaml::from_str::<GatewayConfig>("log: {}").is_err());
    }

    #[test]
    fn test_response_codes() {
        let codes: ResponseCodes =
            serde_yaml::from_str("authentication_error: 407\ncommunication_error: 503").unwrap();

        assert_eq!(codes.code_for(ErrorKind::Authentication).as_u16(), 407);
        assert_eq!(codes.code_for(ErrorKind::AuthenticationData).as_u16(), 407);
        assert_eq!(codes.code_for(ErrorKind::CommunicationTimeout).as_u16(), 503);
        assert_eq!(codes.code_for(ErrorKind::Authorization), StatusCode::FORBIDDEN);

        let defaults = ResponseCodes::default();
        assert_eq!(defaults.code_for(ErrorKind::AuthenticationData), StatusCode::UNAUTHORIZED);
        assert_eq!(defaults.code_for(ErrorKind::CommunicationTimeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(defaults.code_for(ErrorKind::Precondition), StatusCode::BAD_REQUEST);
        assert_eq!(defaults.code_for(ErrorKind::Canceled), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(defaults.code_for(ErrorKind::Configuration), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_response_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portcullis.yaml");
        fs::write(&path, "responses: {internal_error: 42}\nrules: {src: r.yaml}").unwrap();

        assert!(GatewayConfig::load(&path).is_err());
    }

    #[test]
    fn test_build_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gateway(
            dir.path(),
            "rules:\n  - id: open\n  - id: closed\n    execute: [{authorizer: deny_all}]\n",
        );

        let gateway = Gateway::build(GatewayConfig::load(&path).unwrap()).unwrap();
        assert_eq!(gateway.catalog().count(MechanismKind::Authenticator), 1);
        assert_eq!(gateway.rules().snapshot().ids().collect::<Vec<_>>(), ["open", "closed"]);
        assert_eq!(gateway.config().responses.code_for(ErrorKind::Authorization).as_u16(), 404);
    }

    #[test]
    fn test_reload_failure_keeps_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gateway(dir.path(), "rules: [{id: open}]");
        let gateway = Gateway::build(GatewayConfig::load(&path).unwrap()).unwrap();

        fs::write(dir.path().join("rules.yaml"), "rules: [{id: broken, execute: [{finalizer: nope}]}]").unwrap();
        assert!(gateway.reload_rules().is_err());
        assert!(gateway.rules().get("open").is_some());

        fs::write(dir.path().join("rules.yaml"), "rules: [{id: other}]").unwrap();
        gateway.reload_rules().unwrap();
        assert!(gateway.rules().get("open").is_none());
        assert!(gateway.rules().get("other").is_some());
    }

    #[test]
    fn test_unsupported_rule_file() {
        let config: GatewayConfig = serde_yaml::from_str("rules: {src: rules.toml}").unwrap();
        let err = config.load_rules().unwrap_err();
        assert!(err.to_string().contains("unsupported rule set file"));
    }
}
