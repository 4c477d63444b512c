use crate::catalog::MechanismArgs;
use crate::config::{decode, merge};
use crate::handler::SubjectHandler;
use async_trait::async_trait;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext, Subject};
use serde::Deserialize;
use std::sync::Arc;

fn default_subject() -> String {
    "anonymous".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnonymousConfig {
    #[serde(default = "default_subject")]
    subject: String,
}

/// Establishes a fixed subject
#[derive(Debug)]
pub struct AnonymousAuthenticator {
    id: String,
    continue_on_error: bool,
    raw: RawConfig,
    subject: String,
}

impl AnonymousAuthenticator {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed settings or an empty
    /// subject id
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::build(args.id, args.continue_on_error, args.config.cloned().unwrap_or_default())
    }

    fn build(id: &str, continue_on_error: bool, raw: RawConfig) -> CoreResult<Self> {
        let config: AnonymousConfig = decode(Some(&raw), "anonymous authenticator", id)?;
        if config.subject.is_empty() {
            return Err(Error::configuration("anonymous subject id must not be empty").with_handler_id(id));
        }

        Ok(Self {
            id: id.to_string(),
            continue_on_error,
            raw,
            subject: config.subject,
        })
    }

    /// Id given to established subjects
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl SubjectHandler for AnonymousAuthenticator {
    fn handler_id(&self) -> &str {
        &self.id
    }

    fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    async fn execute(
        &self,
        _ctx: &dyn RequestContext,
        subject: &mut Option<Subject>,
    ) -> CoreResult<()> {
        if subject.is_none() {
            tracing::debug!(id = %self.id, subject = %self.subject, "authenticating using anonymous authenticator");
            *subject = Some(Subject::new(self.subject.clone()));
        }
        Ok(())
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn SubjectHandler>> {
        match merge(&self.raw, config) {
            Some(raw) => Ok(Arc::new(Self::build(&self.id, self.continue_on_error, raw)?)),
            None => Ok(self),
        }
    }
}
