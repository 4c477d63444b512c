use crate::catalog::MechanismArgs;
use crate::config::{decode, merge};
use crate::extractors::{AuthDataExtractStrategy, HeaderValueExtractStrategy};
use crate::handler::SubjectHandler;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use portcullis_cache::Cache;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext, Subject};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BasicAuthConfig {
    user_id: String,
    password: String,
    #[serde(default, with = "humantime_serde")]
    cache_ttl: Option<Duration>,
}

/// Verifies HTTP Basic credentials against a single configured user
///
/// Credentials are held as SHA-256 digests only. With `cache_ttl` set,
/// successful verifications are memoized per presented credentials.
pub struct BasicAuthAuthenticator {
    id: String,
    continue_on_error: bool,
    raw: RawConfig,
    user_id: String,
    user_id_digest: [u8; 32],
    password_digest: [u8; 32],
    cache_ttl: Option<Duration>,
    cache: Arc<dyn Cache>,
    extractor: HeaderValueExtractStrategy,
}

fn digest(value: &[u8]) -> [u8; 32] {
    Sha256::digest(value).into()
}

impl BasicAuthAuthenticator {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed settings
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::build(
            args.id,
            args.continue_on_error,
            args.config.cloned().unwrap_or_default(),
            Arc::clone(args.cache),
        )
    }

    fn build(id: &str, continue_on_error: bool, raw: RawConfig, cache: Arc<dyn Cache>) -> CoreResult<Self> {
        let config: BasicAuthConfig = decode(Some(&raw), "basic_auth authenticator", id)?;
        if config.user_id.is_empty() || config.password.is_empty() {
            return Err(Error::configuration("basic_auth requires a non-empty user_id and password")
                .with_handler_id(id));
        }

        Ok(Self {
            id: id.to_string(),
            continue_on_error,
            raw,
            user_id_digest: digest(config.user_id.as_bytes()),
            password_digest: digest(config.password.as_bytes()),
            user_id: config.user_id,
            cache_ttl: config.cache_ttl.filter(|ttl| !ttl.is_zero()),
            cache,
            extractor: HeaderValueExtractStrategy {
                name: http::header::AUTHORIZATION.to_string(),
                scheme: Some("Basic".to_string()),
            },
        })
    }

    fn cache_key(&self, credentials: &str) -> String {
        // Configured digests are part of the key so a specialization with a
        // different password never sees the prototype's entries.
        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        hasher.update(self.user_id_digest);
        hasher.update(self.password_digest);
        hasher.update(credentials.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn verify(&self, credentials: &str) -> CoreResult<()> {
        let decoded = STANDARD.decode(credentials).map_err(|err| {
            Error::authentication("failed to decode basic auth data")
                .with_handler_id(&self.id)
                .caused_by(err)
        })?;
        let decoded = String::from_utf8(decoded).map_err(|err| {
            Error::authentication("basic auth data is not valid UTF-8")
                .with_handler_id(&self.id)
                .caused_by(err)
        })?;
        let (user_id, password) = decoded.split_once(':').ok_or_else(|| {
            Error::authentication("malformed basic auth data").with_handler_id(&self.id)
        })?;

        let user_matches = digest(user_id.as_bytes()) == self.user_id_digest;
        let password_matches = digest(password.as_bytes()) == self.password_digest;
        if !(user_matches && password_matches) {
            return Err(Error::authentication("invalid user credentials").with_handler_id(&self.id));
        }

        Ok(())
    }
}

#[async_trait]
impl SubjectHandler for BasicAuthAuthenticator {
    fn handler_id(&self) -> &str {
        &self.id
    }

    fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    async fn execute(
        &self,
        ctx: &dyn RequestContext,
        subject: &mut Option<Subject>,
    ) -> CoreResult<()> {
        if subject.is_some() {
            return Ok(());
        }

        tracing::debug!(id = %self.id, "authenticating using basic_auth authenticator");

        let credentials = self
            .extractor
            .extract(ctx)
            .map_err(|err| err.with_handler_id(&self.id))?;

        let key = self.cache_ttl.map(|_| self.cache_key(&credentials));
        if let Some(cached) = key.as_deref().and_then(|key| self.cache.get(key)) {
            if cached.as_ref() == self.user_id.as_bytes() {
                tracing::debug!(id = %self.id, "reusing cached basic auth verification");
                *subject = Some(Subject::new(self.user_id.clone()));
                return Ok(());
            }
        }

        self.verify(&credentials)?;

        if let (Some(key), Some(ttl)) = (key, self.cache_ttl) {
            self.cache.set(&key, Bytes::from(self.user_id.clone()), ttl);
        }

        *subject = Some(Subject::new(self.user_id.clone()));
        Ok(())
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn SubjectHandler>> {
        match merge(&self.raw, config) {
            Some(raw) => Ok(Arc::new(Self::build(
                &self.id,
                self.continue_on_error,
                raw,
                Arc::clone(&self.cache),
            )?)),
            None => Ok(self),
        }
    }
}
