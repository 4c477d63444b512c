//! Request context capability consumed by mechanisms.

use crate::error::{CoreResult, Error};
use http::header::COOKIE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Snapshot of the request under decision
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Full request URL
    pub url: Url,
    /// Request headers
    pub headers: HeaderMap,
    /// Client addresses, closest client first
    pub client_ips: Vec<String>,
}

impl Request {
    /// Create a new request snapshot
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            client_ips: Vec::new(),
        }
    }

    /// Append a header value
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Append a client address
    #[must_use]
    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ips.push(ip.into());
        self
    }

    /// First value of a query parameter
    #[must_use]
    pub fn query_parameter(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Value of a request cookie
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }

    /// Representation exposed to templates
    #[must_use]
    pub fn template_value(&self) -> Value {
        let mut headers = Map::new();
        for name in self.headers.keys() {
            let values = self
                .headers
                .get_all(name)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect::<Vec<_>>()
                .join(",");
            headers.insert(name.as_str().to_string(), Value::String(values));
        }

        json!({
            "Method": self.method.as_str(),
            "URL": self.url.as_str(),
            "Header": headers,
            "ClientIPs": self.client_ips,
        })
    }
}

/// Cancellation and deadline scope of a single request
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl AppContext {
    /// Create a context without deadline
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Set an absolute deadline
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Token observed by blocking work
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Fail fast when the request is no longer wanted
    ///
    /// # Errors
    ///
    /// Returns a canceled error if the token fired or the deadline passed
    pub fn check(&self) -> CoreResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(Error::canceled("request canceled"));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::canceled("request deadline exceeded"));
        }
        Ok(())
    }

    /// Run blocking work, aborting it on cancellation or deadline
    ///
    /// # Errors
    ///
    /// Returns the work's error, or a canceled error if the request went away first
    pub async fn run<F, T>(&self, work: F) -> CoreResult<T>
    where
        F: Future<Output = CoreResult<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(Error::canceled("request canceled")),
            () = deadline => Err(Error::canceled("request deadline exceeded")),
            result = work => result,
        }
    }
}

/// Capability through which mechanisms see and shape a request
pub trait RequestContext: Send + Sync {
    /// Underlying request snapshot
    fn request(&self) -> &Request;

    /// Cancellation scope of the request
    fn app_context(&self) -> &AppContext;

    /// Client addresses, closest client first
    fn request_client_ips(&self) -> &[String] {
        &self.request().client_ips
    }

    /// Request headers
    fn request_headers(&self) -> &HeaderMap {
        &self.request().headers
    }

    /// First value of a query parameter
    fn request_query_parameter(&self, name: &str) -> Option<String> {
        self.request().query_parameter(name)
    }

    /// Value of a request cookie
    fn request_cookie(&self, name: &str) -> Option<String> {
        self.request().cookie(name)
    }

    /// Set a cookie on the client response
    fn add_response_cookie(&self, name: &str, value: &str);

    /// Set a cookie on the request forwarded upstream
    fn add_cookie_for_upstream(&self, name: &str, value: &str);

    /// Set a header on the request forwarded upstream
    fn add_header_for_upstream(&self, name: &str, value: &str);
}

/// Request and response changes recorded during a decision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mutations {
    /// Cookies for the client response
    pub response_cookies: BTreeMap<String, String>,
    /// Cookies for the upstream request
    pub upstream_cookies: BTreeMap<String, String>,
    /// Headers for the upstream request
    pub upstream_headers: BTreeMap<String, String>,
}

/// In-process [`RequestContext`]
#[derive(Debug)]
pub struct DefaultContext {
    request: Request,
    app: AppContext,
    mutations: Mutex<Mutations>,
}

impl DefaultContext {
    /// Create a context for the given request
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            app: AppContext::new(),
            mutations: Mutex::new(Mutations::default()),
        }
    }

    /// Use the given cancellation scope
    #[must_use]
    pub fn with_app_context(mut self, app: AppContext) -> Self {
        self.app = app;
        self
    }

    /// Snapshot of the recorded mutations
    #[must_use]
    pub fn mutations(&self) -> Mutations {
        self.mutations.lock().clone()
    }

    /// Consume the context, returning the recorded mutations
    #[must_use]
    pub fn into_mutations(self) -> Mutations {
        self.mutations.into_inner()
    }
}

impl RequestContext for DefaultContext {
    fn request(&self) -> &Request {
        &self.request
    }

    fn app_context(&self) -> &AppContext {
        &self.app
    }

    fn add_response_cookie(&self, name: &str, value: &str) {
        self.mutations
            .lock()
            .response_cookies
            .insert(name.to_string(), value.to_string());
    }

    fn add_cookie_for_upstream(&self, name: &str, value: &str) {
        self.mutations
            .lock()
            .upstream_cookies
            .insert(name.to_string(), value.to_string());
    }

    fn add_header_for_upstream(&self, name: &str, value: &str) {
        self.mutations
            .lock()
            .upstream_headers
            .insert(name.to_string(), value.to_string());
    }
}
