use crate::catalog::MechanismArgs;
use crate::config::{decode, merge};
use crate::handler::SubjectHandler;
use async_trait::async_trait;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext, Subject};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttributesConfig {
    #[serde(default)]
    required: BTreeMap<String, Value>,
}

/// Requires subject attributes to hold configured values
#[derive(Debug)]
pub struct AttributesAuthorizer {
    id: String,
    continue_on_error: bool,
    raw: RawConfig,
    required: BTreeMap<String, Value>,
}

impl AttributesAuthorizer {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed settings or when no
    /// attributes are required
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::build(args.id, args.continue_on_error, args.config.cloned().unwrap_or_default())
    }

    fn build(id: &str, continue_on_error: bool, raw: RawConfig) -> CoreResult<Self> {
        let config: AttributesConfig = decode(Some(&raw), "attributes authorizer", id)?;
        if config.required.is_empty() {
            return Err(Error::configuration("no required attributes defined").with_handler_id(id));
        }

        Ok(Self {
            id: id.to_string(),
            continue_on_error,
            raw,
            required: config.required,
        })
    }
}

#[async_trait]
impl SubjectHandler for AttributesAuthorizer {
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
        tracing::debug!(id = %self.id, "authorizing using attributes authorizer");

        let subject = subject.as_ref().ok_or_else(|| {
            Error::internal("failed to execute attributes authorizer due to 'nil' subject")
                .with_handler_id(&self.id)
        })?;

        match self
            .required
            .iter()
            .find(|(name, expected)| subject.attribute(name) != Some(*expected))
        {
            Some((name, _)) => Err(Error::authorization(format!(
                "subject attribute '{}' does not match",
                name
            ))
            .with_handler_id(&self.id)),
            None => Ok(()),
        }
    }

    fn with_config(self: Arc<Self>, config: Option<&RawConfig>) -> CoreResult<Arc<dyn SubjectHandler>> {
        match merge(&self.raw, config) {
            Some(raw) => Ok(Arc::new(Self::build(&self.id, self.continue_on_error, raw)?)),
            None => Ok(self),
        }
    }
}
