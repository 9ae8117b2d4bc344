//! Retry a reasoning-provider request under alternate model ids.
//!
//! Attempts run in a fixed order: the request's own model first, then each
//! configured candidate not tried yet. Only "model not supported" rejections
//! advance to the next id; any other error is returned at once.

use crate::error::{Error, Result};
use crate::request::MessagesRequest;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, info, warn};

/// A successful response and the model id that produced it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub model: String,
    pub response: Value,
    pub attempts: usize,
}

#[derive(Debug, Clone)]
pub struct ModelFallbackResolver {
    candidates: Vec<String>,
}

impl ModelFallbackResolver {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    /// Model ids in attempt order for a request addressed to `primary`.
    pub fn attempt_order(&self, primary: &str) -> Vec<String> {
        let mut order = vec![primary.to_string()];
        for candidate in &self.candidates {
            if !order.contains(candidate) {
                order.push(candidate.clone());
            }
        }
        order
    }

    pub async fn resolve<F, Fut>(&self, request: &MessagesRequest, mut call: F) -> Result<Resolved>
    where
        F: FnMut(MessagesRequest) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let order = self.attempt_order(&request.model);
        let mut tried = Vec::with_capacity(order.len());

        for model in order {
            debug!(model = %model, attempt = tried.len() + 1, "sending reasoning request");
            match call(request.with_model(&model)).await {
                Ok(response) => {
                    if !tried.is_empty() {
                        info!(model = %model, rejected = ?tried, "using fallback model");
                    }
                    return Ok(Resolved {
                        model,
                        response,
                        attempts: tried.len() + 1,
                    });
                }
                Err(e) if e.is_model_not_supported() => {
                    warn!(model = %model, error = %e, "model not supported, trying next candidate");
                    tried.push(model);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::NoSupportedModel { tried })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReasoningConfig;
    use crate::conversation::{Conversation, ProviderMode, Role};
    use crate::request::build_messages_request;
    use serde_json::json;
    use std::cell::RefCell;

    fn request(model: &str) -> MessagesRequest {
        let mut c = Conversation::seeded(ProviderMode::Reasoning, false, "sys");
        c.append(Role::User, "hi").unwrap();
        let config = ReasoningConfig {
            model: model.into(),
            ..ReasoningConfig::default()
        };
        build_messages_request(&c, &config, false)
    }

    fn model_rejected() -> Error {
        Error::api_with_status("proxy", "Model not supported", 400)
    }

    #[test]
    fn attempt_order_starts_with_primary_and_dedups() {
        let resolver = ModelFallbackResolver::new(vec!["m1".into(), "m2".into(), "m1".into()]);
        assert_eq!(resolver.attempt_order("m1"), vec!["m1", "m2"]);
        assert_eq!(resolver.attempt_order("m0"), vec!["m0", "m1", "m2"]);
    }

    #[tokio::test]
    async fn first_success_returns_immediately() {
        let resolver = ModelFallbackResolver::new(vec!["m1".into(), "m2".into()]);
        let calls = RefCell::new(Vec::new());
        let resolved = resolver
            .resolve(&request("m1"), |req| {
                calls.borrow_mut().push(req.model.clone());
                async { Ok::<_, Error>(json!({"content": []})) }
            })
            .await
            .unwrap();
        assert_eq!(resolved.model, "m1");
        assert_eq!(resolved.attempts, 1);
        assert_eq!(*calls.borrow(), vec!["m1"]);
    }

    #[tokio::test]
    async fn advances_on_model_rejection() {
        let resolver = ModelFallbackResolver::new(vec!["m1".into(), "m2".into(), "m3".into()]);
        let calls = RefCell::new(Vec::new());
        let resolved = resolver
            .resolve(&request("m1"), |req| {
                calls.borrow_mut().push(req.model.clone());
                let ok = req.model == "m3";
                async move {
                    if ok {
                        Ok(json!({"model": "m3"}))
                    } else {
                        Err(model_rejected())
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(resolved.model, "m3");
        assert_eq!(resolved.attempts, 3);
        assert_eq!(resolved.response["model"], "m3");
        assert_eq!(*calls.borrow(), vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn exhaustion_after_every_candidate() {
        let resolver = ModelFallbackResolver::new(vec!["m1".into(), "m2".into(), "m3".into()]);
        let calls = RefCell::new(0usize);
        let err = resolver
            .resolve(&request("m1"), |_| {
                *calls.borrow_mut() += 1;
                async { Err::<Value, _>(model_rejected()) }
            })
            .await
            .unwrap_err();
        assert_eq!(*calls.borrow(), 3);
        match err {
            Error::NoSupportedModel { tried } => assert_eq!(tried, vec!["m1", "m2", "m3"]),
            other => panic!("expected NoSupportedModel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let resolver = ModelFallbackResolver::new(vec!["m1".into(), "m2".into(), "m3".into()]);
        let calls = RefCell::new(0usize);
        let err = resolver
            .resolve(&request("m1"), |_| {
                *calls.borrow_mut() += 1;
                async { Err::<Value, _>(Error::api_with_status("proxy", "overloaded", 529)) }
            })
            .await
            .unwrap_err();
        assert_eq!(*calls.borrow(), 1);
        assert!(matches!(err, Error::Api { status_code: Some(529), .. }));
    }

    #[tokio::test]
    async fn payload_is_unchanged_apart_from_model() {
        let resolver = ModelFallbackResolver::new(vec!["m2".into()]);
        let original = request("m1");
        let seen = RefCell::new(Vec::new());
        resolver
            .resolve(&original, |req| {
                seen.borrow_mut().push(req);
                async { Err::<Value, _>(model_rejected()) }
            })
            .await
            .unwrap_err();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].model, "m2");
        assert_eq!(seen[1].system, original.system);
        assert_eq!(seen[1].messages, original.messages);
        assert_eq!(seen[1].max_tokens, original.max_tokens);
    }
}
