use crate::catalog::MechanismArgs;
use crate::config::{decode, merge};
use crate::handler::SubjectHandler;
use async_trait::async_trait;
use portcullis_core::{CoreResult, Error, RawConfig, RequestContext, Subject, Template};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where rendered cookies are placed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieTarget {
    /// `Set-Cookie` on the client response
    #[default]
    Response,
    /// `Cookie` on the request forwarded upstream
    Upstream,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CookieConfig {
    #[serde(default)]
    cookies: BTreeMap<String, Template>,
    #[serde(default)]
    target: CookieTarget,
}

/// Renders cookie values from the subject
#[derive(Debug)]
pub struct CookieFinalizer {
    id: String,
    continue_on_error: bool,
    raw: RawConfig,
    cookies: BTreeMap<String, Template>,
    target: CookieTarget,
}

impl CookieFinalizer {
    /// Build from a catalog definition
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed settings or when no
    /// cookies are defined
    pub fn new(args: &MechanismArgs<'_>) -> CoreResult<Self> {
        Self::build(args.id, args.continue_on_error, args.config.cloned().unwrap_or_default())
    }

    fn build(id: &str, continue_on_error: bool, raw: RawConfig) -> CoreResult<Self> {
        let config: CookieConfig = decode(Some(&raw), "cookie finalizer", id)?;
        if config.cookies.is_empty() {
            return Err(Error::configuration("no cookie definitions provided").with_handler_id(id));
        }

        Ok(Self {
            id: id.to_string(),
            continue_on_error,
            raw,
            cookies: config.cookies,
            target: config.target,
        })
    }

    /// Configured cookie templates
    #[must_use]
    pub fn cookies(&self) -> &BTreeMap<String, Template> {
        &self.cookies
    }

    /// Configured target
    #[must_use]
    pub fn target(&self) -> CookieTarget {
        self.target
    }
}

#[async_trait]
impl SubjectHandler for CookieFinalizer {
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
        tracing::debug!(id = %self.id, "finalizing using cookie finalizer");

        let subject = subject.as_ref().ok_or_else(|| {
            Error::internal("failed to execute cookie finalizer due to 'nil' subject")
                .with_handler_id(&self.id)
        })?;

        let data = subject.template_data(ctx.request());
        for (name, template) in &self.cookies {
            let value = template.render(&data).map_err(|err| {
                Error::internal(format!("failed to render value for '{}' cookie", name))
                    .with_handler_id(&self.id)
                    .caused_by(err)
            })?;

            match self.target {
                CookieTarget::Response => ctx.add_response_cookie(name, &value),
                CookieTarget::Upstream => ctx.add_cookie_for_upstream(name, &value),
            }
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
