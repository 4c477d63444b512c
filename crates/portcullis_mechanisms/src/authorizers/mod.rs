//! Built-in authorizers.

mod attributes;
mod fixed;

pub use attributes::AttributesAuthorizer;
pub use fixed::FixedAuthorizer;

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

    fn context() -> DefaultContext {
        DefaultContext::new(Request::new(
            Method::DELETE,
            Url::parse("https://example.com/orders/1").unwrap(),
        ))
    }

    fn raw(value: serde_json::Value) -> RawConfig {
        value.as_object().cloned().unwrap()
    }

    fn attributes(config: &RawConfig) -> Arc<AttributesAuthorizer> {
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        Arc::new(
            AttributesAuthorizer::new(&MechanismArgs {
                id: "attrs",
                continue_on_error: false,
                config: Some(config),
                cache: &cache,
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_allow_and_deny() {
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        let args = MechanismArgs {
            id: "fixed",
            continue_on_error: false,
            config: None,
            cache: &cache,
        };

        let mut subject = None;
        FixedAuthorizer::allow(&args)
            .unwrap()
            .execute(&context(), &mut subject)
            .await
            .unwrap();

        let err = FixedAuthorizer::deny(&args)
            .unwrap()
            .execute(&context(), &mut subject)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(err.handler_id(), Some("fixed"));
    }

    #[tokio::test]
    async fn test_attributes_authorizer() {
        let authorizer = attributes(&raw(json!({"required": {"role": "admin", "level": 3}})));

        let mut subject = Some(
            Subject::new("alice")
                .with_attribute("role", "admin")
                .with_attribute("level", 3),
        );
        authorizer.execute(&context(), &mut subject).await.unwrap();

        let mut subject = Some(Subject::new("bob").with_attribute("role", "admin"));
        let err = authorizer
            .execute(&context(), &mut subject)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(err.message().contains("'level'"));
    }

    #[tokio::test]
    async fn test_attributes_authorizer_requires_subject() {
        let authorizer = attributes(&raw(json!({"required": {"role": "admin"}})));

        let mut subject = None;
        let err = authorizer
            .execute(&context(), &mut subject)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.message().contains("'nil' subject"));
    }

    #[tokio::test]
    async fn test_attributes_overlay_replaces_requirements() {
        let proto = attributes(&raw(json!({"required": {"role": "admin"}})));
        let special = Arc::clone(&proto)
            .with_config(Some(&raw(json!({"required": {"team": "ops"}}))))
            .unwrap();

        let mut subject = Some(Subject::new("carol").with_attribute("team", "ops"));
        special.execute(&context(), &mut subject).await.unwrap();
        assert!(proto.execute(&context(), &mut subject).await.is_err());
    }

    #[test]
    fn test_attributes_requires_definitions() {
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        let err = AttributesAuthorizer::new(&MechanismArgs {
            id: "attrs",
            continue_on_error: false,
            config: None,
            cache: &cache,
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
