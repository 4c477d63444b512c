//! Built-in authenticators.
//!
//! Authenticators run as an ordered chain. Each one leaves an already
//! established subject untouched, so with `continue_on_error` on the earlier
//! entries the first authenticator to succeed decides the subject.

mod anonymous;
mod api_key;
mod basic_auth;
mod noop;
mod unauthorized;

pub use anonymous::AnonymousAuthenticator;
pub use api_key::ApiKeyAuthenticator;
pub use basic_auth::BasicAuthAuthenticator;
pub use noop::NoopAuthenticator;
pub use unauthorized::UnauthorizedAuthenticator;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MechanismArgs;
    use crate::handler::SubjectHandler;
    use http::Method;
    use portcullis_cache::{Cache, NoopCache};
    use portcullis_core::{DefaultContext, ErrorKind, RawConfig, Request, Subject};
    use serde_json::json;
    use std::sync::Arc;
    use url::Url;

    fn args<'a>(config: Option<&'a RawConfig>, cache: &'a Arc<dyn Cache>) -> MechanismArgs<'a> {
        MechanismArgs {
            id: "auth",
            continue_on_error: true,
            config,
            cache,
        }
    }

    fn context() -> DefaultContext {
        DefaultContext::new(Request::new(
            Method::GET,
            Url::parse("https://example.com/public").unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_noop_authenticator() {
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        let auth = NoopAuthenticator::new(&args(None, &cache)).unwrap();
        assert!(auth.continue_on_error());

        let mut subject = None;
        auth.execute(&context(), &mut subject).await.unwrap();
        assert_eq!(subject, Some(Subject::default()));

        let mut subject = Some(Subject::new("alice"));
        auth.execute(&context(), &mut subject).await.unwrap();
        assert_eq!(subject.unwrap().id, "alice");
    }

    #[tokio::test]
    async fn test_anonymous_authenticator() {
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        let proto = Arc::new(AnonymousAuthenticator::new(&args(None, &cache)).unwrap());
        assert_eq!(proto.subject(), "anonymous");

        let mut subject = None;
        proto.execute(&context(), &mut subject).await.unwrap();
        assert_eq!(subject.unwrap().id, "anonymous");

        let overrides = json!({"subject": "guest"}).as_object().cloned().unwrap();
        let special = Arc::clone(&proto).with_config(Some(&overrides)).unwrap();

        let mut subject = None;
        special.execute(&context(), &mut subject).await.unwrap();
        assert_eq!(subject.unwrap().id, "guest");
        assert_eq!(proto.subject(), "anonymous");
    }

    #[test]
    fn test_anonymous_rejects_empty_subject() {
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        let config = json!({"subject": ""}).as_object().cloned().unwrap();
        let err = AnonymousAuthenticator::new(&args(Some(&config), &cache)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_unauthorized_authenticator() {
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        let auth = UnauthorizedAuthenticator::new(&args(None, &cache)).unwrap();

        let mut subject = None;
        let err = auth.execute(&context(), &mut subject).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.handler_id(), Some("auth"));
    }

    #[test]
    fn test_settings_rejected_where_none_apply() {
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        let config = json!({"foo": "bar"}).as_object().cloned().unwrap();

        let err = NoopAuthenticator::new(&args(Some(&config), &cache)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let proto = Arc::new(UnauthorizedAuthenticator::new(&args(None, &cache)).unwrap());
        assert!(proto.with_config(Some(&config)).is_err());
    }
}
