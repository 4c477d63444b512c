//! Subcommand implementations.

use crate::config::Gateway;
use clap::Args;
use color_eyre::eyre::{eyre, Result, WrapErr};
use http::{HeaderName, HeaderValue, Method};
use portcullis_core::{AppContext, DefaultContext, Error, ErrorKind, Request};
use portcullis_mechanisms::{ErrorOutcome, MechanismKind};
use portcullis_rules::RuleError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Counts of a successfully validated configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Authenticator prototypes
    pub authenticators: usize,
    /// Authorizer prototypes
    pub authorizers: usize,
    /// Finalizer prototypes
    pub finalizers: usize,
    /// Error handler prototypes
    pub error_handlers: usize,
    /// Active rules
    pub rules: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "configuration is valid")?;
        writeln!(f, "  authenticators: {}", self.authenticators)?;
        writeln!(f, "  authorizers:    {}", self.authorizers)?;
        writeln!(f, "  finalizers:     {}", self.finalizers)?;
        writeln!(f, "  error handlers: {}", self.error_handlers)?;
        write!(f, "  rules:          {}", self.rules)
    }
}

/// Summarize a built gateway
#[must_use]
pub fn validate(gateway: &Gateway) -> Summary {
    let catalog = gateway.catalog();
    Summary {
        authenticators: catalog.count(MechanismKind::Authenticator),
        authorizers: catalog.count(MechanismKind::Authorizer),
        finalizers: catalog.count(MechanismKind::Finalizer),
        error_handlers: catalog.count(MechanismKind::ErrorHandler),
        rules: gateway.rules().snapshot().len(),
    }
}

/// Request to decide
#[derive(Debug, Clone, Args)]
pub struct DecideArgs {
    /// Id of the rule to execute
    #[arg(short, long)]
    pub rule: String,
    /// Request URL
    #[arg(short, long)]
    pub url: String,
    /// Request method
    #[arg(short, long, default_value = "GET")]
    pub method: String,
    /// Request header as 'Name: value', repeatable
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,
    /// Client address, closest client first, repeatable
    #[arg(long = "client-ip")]
    pub client_ips: Vec<String>,
    /// Abort the pipeline after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl DecideArgs {
    fn request(&self) -> Result<Request> {
        let method = Method::from_bytes(self.method.as_bytes())
            .wrap_err_with(|| format!("invalid method '{}'", self.method))?;
        let url = Url::parse(&self.url).wrap_err_with(|| format!("invalid url '{}'", self.url))?;

        let mut request = Request::new(method, url);
        for header in &self.headers {
            let (name, value) = parse_header(header)?;
            request = request.with_header(name, value);
        }
        for ip in &self.client_ips {
            request = request.with_client_ip(ip.clone());
        }

        Ok(request)
    }
}

fn parse_header(header: &str) -> Result<(HeaderName, HeaderValue)> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| eyre!("header '{}' is not of the form 'Name: value'", header))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .wrap_err_with(|| format!("invalid header name in '{}'", header))?;
    let value = HeaderValue::from_str(value.trim())
        .wrap_err_with(|| format!("invalid header value in '{}'", header))?;
    Ok((name, value))
}

/// Failure behind a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionError {
    /// Classification
    pub kind: ErrorKind,
    /// Message including causes
    pub message: String,
    /// Mechanism that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    /// Error handler that produced the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handled_by: Option<String>,
}

impl DecisionError {
    fn new(err: &Error, handled_by: Option<String>) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            handler: err.handler_id().map(str::to_string),
            handled_by,
        }
    }
}

/// Outcome of running a rule against a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Executed rule
    pub rule: String,
    /// Response status, 200 if the request may pass
    pub status: u16,
    /// Headers of the client response
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Cookies of the client response
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, String>,
    /// Cookies added to the upstream request
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub upstream_cookies: BTreeMap<String, String>,
    /// Headers added to the upstream request
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub upstream_headers: BTreeMap<String, String>,
    /// Redirect target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Failure, if the request was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DecisionError>,
}

impl Decision {
    fn new(rule: &str, status: u16) -> Self {
        Self {
            rule: rule.to_string(),
            status,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            upstream_cookies: BTreeMap::new(),
            upstream_headers: BTreeMap::new(),
            location: None,
            error: None,
        }
    }
}

/// Execute a rule against a synthesized request
///
/// # Errors
///
/// Returns error if the rule does not exist or the request arguments are
/// invalid. Pipeline failures are part of the decision.
pub async fn decide(gateway: &Gateway, args: &DecideArgs) -> Result<Decision> {
    let rule = gateway
        .rules()
        .get(&args.rule)
        .ok_or_else(|| eyre!("no rule with id '{}' defined", args.rule))?;

    let mut app = AppContext::new();
    if let Some(timeout) = args.timeout_ms {
        app = app.with_timeout(Duration::from_millis(timeout));
    }
    let ctx = DefaultContext::new(args.request()?).with_app_context(app);

    let result = rule.execute(&ctx).await;
    let mutations = ctx.into_mutations();

    let decision = match result {
        Ok(()) => Decision {
            cookies: mutations.response_cookies,
            upstream_cookies: mutations.upstream_cookies,
            upstream_headers: mutations.upstream_headers,
            ..Decision::new(rule.id(), 200)
        },
        Err(RuleError::Handled {
            handler_id,
            outcome,
            cause,
        }) => {
            let mut decision = Decision::new(rule.id(), outcome.code().as_u16());
            match outcome {
                ErrorOutcome::Respond { headers, .. } => decision.headers = headers,
                ErrorOutcome::Redirect { location, .. } => decision.location = Some(location),
            }
            decision.error = Some(DecisionError::new(&cause, Some(handler_id)));
            decision
        }
        Err(RuleError::Unhandled(err)) => {
            let status = gateway.config().responses.code_for(err.kind());
            Decision {
                error: Some(DecisionError::new(&err, None)),
                ..Decision::new(rule.id(), status.as_u16())
            }
        }
    };

    tracing::info!(rule = %decision.rule, status = decision.status, "request decided");
    Ok(decision)
}
