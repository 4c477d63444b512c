use crate::catalog::MechanismArgs;
use crate::config::{decode, merge};
use crate::handler::SubjectHandler;
use async_trait::async_trait;
use http::HeaderName;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext, Subject, Template};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HeaderConfig {
    #[serde(default)]
    headers: BTreeMap<String, Template>,
}

/// Renders upstream request headers from the subject
#[derive(Debug)]
pub struct HeaderFinalizer {
    id: String,
    continue_on_error: bool,
    raw: RawConfig,
    headers: BTreeMap<String, Template>,
}

impl HeaderFinalizer {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed settings, invalid header
    /// names or when no headers are defined
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::build(args.id, args.continue_on_error, args.config.cloned().unwrap_or_default())
    }

    fn build(id: &str, continue_on_error: bool, raw: RawConfig) -> CoreResult<Self> {
        let config: HeaderConfig = decode(Some(&raw), "header finalizer", id)?;
        if config.headers.is_empty() {
            return Err(Error::configuration("no header definitions provided").with_handler_id(id));
        }

        for name in config.headers.keys() {
            HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                Error::configuration(format!("invalid header name '{}'", name))
                    .with_handler_id(id)
                    .caused_by(err)
            })?;
        }

        Ok(Self {
            id: id.to_string(),
            continue_on_error,
            raw,
            headers: config.headers,
        })
    }
}

#[async_trait]
impl SubjectHandler for HeaderFinalizer {
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
        tracing::debug!(id = %self.id, "finalizing using header finalizer");

        let subject = subject.as_ref().ok_or_else(|| {
            Error::internal("failed to execute header finalizer due to 'nil' subject")
                .with_handler_id(&self.id)
        })?;

        let data = subject.template_data(ctx.request());
        for (name, template) in &self.headers {
            let value = template.render(&data).map_err(|err| {
                Error::internal(format!("failed to render value for '{}' header", name))
                    .with_handler_id(&self.id)
                    .caused_by(err)
            })?;
            ctx.add_header_for_upstream(name, &value);
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
