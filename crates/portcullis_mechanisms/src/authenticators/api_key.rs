use crate::catalog::MechanismArgs;
use crate::config::{decode, merge};
use crate::extractors::{AuthDataExtractStrategy, CompositeExtractStrategy, ExtractSource};
use crate::handler::SubjectHandler;
use async_trait::async_trait;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext, Subject};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApiKeyConfig {
    #[serde(default)]
    sources: Vec<ExtractSource>,
    #[serde(default)]
    keys: BTreeMap<String, String>,
}

/// Maps static API keys to subjects
///
/// Keys are held as SHA-256 digests.
#[derive(Debug)]
pub struct ApiKeyAuthenticator {
    id: String,
    continue_on_error: bool,
    raw: RawConfig,
    extractor: CompositeExtractStrategy,
    subjects: HashMap<[u8; 32], String>,
}

impl ApiKeyAuthenticator {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed settings, missing sources
    /// or missing keys
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::build(args.id, args.continue_on_error, args.config.cloned().unwrap_or_default())
    }

    fn build(id: &str, continue_on_error: bool, raw: RawConfig) -> CoreResult<Self> {
        let config: ApiKeyConfig = decode(Some(&raw), "api_key authenticator", id)?;

        if config.sources.is_empty() {
            return Err(Error::configuration("no api key sources configured").with_handler_id(id));
        }
        if config.keys.is_empty() {
            return Err(Error::configuration("no api keys configured").with_handler_id(id));
        }

        let extractor = CompositeExtractStrategy::from_sources(&config.sources)
            .map_err(|msg| Error::configuration(msg).with_handler_id(id))?;

        let subjects: HashMap<[u8; 32], String> = config
            .keys
            .into_iter()
            .map(|(key, subject)| (Sha256::digest(key.as_bytes()).into(), subject))
            .collect();

        Ok(Self {
            id: id.to_string(),
            continue_on_error,
            raw,
            extractor,
            subjects,
        })
    }
}

#[async_trait]
impl SubjectHandler for ApiKeyAuthenticator {
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

        tracing::debug!(id = %self.id, "authenticating using api_key authenticator");

        let key = self
            .extractor
            .extract(ctx)
            .map_err(|err| err.with_handler_id(&self.id))?;
        let digest: [u8; 32] = Sha256::digest(key.as_bytes()).into();

        let id = self
            .subjects
            .get(&digest)
            .ok_or_else(|| Error::authentication("unknown api key").with_handler_id(&self.id))?;

        *subject = Some(Subject::new(id.clone()));
        Ok(())
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn SubjectHandler>> {
        match merge(&self.raw, config) {
            Some(raw) => Ok(Arc::new(Self::build(&self.id, self.continue_on_error, raw)?)),
            None => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, HeaderValue, Method};
    use portcullis_cache::{Cache, NoopCache};
    use portcullis_core::{DefaultContext, ErrorKind, Request};
    use serde_json::json;
    use url::Url;

    fn authenticator(config: serde_json::Value) -> CoreResult<ApiKeyAuthenticator> {
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        let config = config.as_object().cloned().unwrap();
        ApiKeyAuthenticator::new(&MechanismArgs {
            id: "keys",
            continue_on_error: false,
            config: Some(&config),
            cache: &cache,
        })
    }

    fn context(url: &str) -> DefaultContext {
        DefaultContext::new(
            Request::new(Method::GET, Url::parse(url).unwrap()).with_header(
                HeaderName::from_static("x-api-key"),
                HeaderValue::from_static("k-header"),
            ),
        )
    }

    fn config() -> serde_json::Value {
        json!({
            "sources": [{"query_parameter": "api_key"}, {"header": "X-Api-Key"}],
            "keys": {"k-header": "service-a", "k-query": "service-b"}
        })
    }

    #[tokio::test]
    async fn test_known_keys() {
        let auth = authenticator(config()).unwrap();

        let mut subject = None;
        auth.execute(&context("https://example.com/?api_key=k-query"), &mut subject)
            .await
            .unwrap();
        assert_eq!(subject.unwrap().id, "service-b");

        let mut subject = None;
        auth.execute(&context("https://example.com/"), &mut subject)
            .await
            .unwrap();
        assert_eq!(subject.unwrap().id, "service-a");
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let auth = authenticator(config()).unwrap();

        let mut subject = None;
        let err = auth
            .execute(&context("https://example.com/?api_key=nope"), &mut subject)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(subject.is_none());
    }

    #[tokio::test]
    async fn test_established_subject_is_kept() {
        let auth = authenticator(config()).unwrap();

        let mut subject = Some(Subject::new("earlier"));
        auth.execute(&context("https://example.com/?api_key=nope"), &mut subject)
            .await
            .unwrap();
        assert_eq!(subject.unwrap().id, "earlier");
    }

    #[test]
    fn test_invalid_config() {
        for config in [
            json!({"keys": {"a": "b"}}),
            json!({"sources": [{"header": "X-Api-Key"}]}),
            json!({"sources": [{"header": "X", "cookie": "y"}], "keys": {"a": "b"}}),
        ] {
            let err = authenticator(config).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
    }
}
