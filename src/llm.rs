use crate::config::Config;
use crate::error::Result;
use crate::http::HttpClient;
use crate::request::{ChatCompletionRequest, MessagesRequest};
use serde_json::Value;
use tracing::{debug, warn};

/// Transport seam between the session and the providers.
///
/// Responses come back as raw JSON; interpreting them is the normalizer's job.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn complete_chat(&self, request: &ChatCompletionRequest) -> Result<Value>;
    async fn create_message(&self, request: &MessagesRequest) -> Result<Value>;
}

impl<T: Backend> Backend for &T {
    async fn complete_chat(&self, request: &ChatCompletionRequest) -> Result<Value> {
        (**self).complete_chat(request).await
    }

    async fn create_message(&self, request: &MessagesRequest) -> Result<Value> {
        (**self).create_message(request).await
    }
}

pub struct LlmClient {
    api_key: String,
    chat_base_url: String,
    reasoning_base_url: String,
    anthropic_version: String,
    http: HttpClient,
}

impl LlmClient {
    pub fn new(config: &Config, api_key: String) -> Result<Self> {
        let http = HttpClient::new(
            concat!("dualchat/", env!("CARGO_PKG_VERSION")),
            config.api.timeout(),
            config.api.max_retries,
        )?;
        Ok(Self {
            api_key,
            chat_base_url: config.chat.base_url.trim_end_matches('/').to_string(),
            reasoning_base_url: config.reasoning.base_url.trim_end_matches('/').to_string(),
            anthropic_version: config.reasoning.anthropic_version.clone(),
            http,
        })
    }

    /// Build from config, reading the credential from the configured env var.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::new(config, api_key)
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.chat_base_url)
    }

    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.reasoning_base_url)
    }
}

impl Backend for LlmClient {
    async fn complete_chat(&self, request: &ChatCompletionRequest) -> Result<Value> {
        debug!(model = %request.model, messages = request.messages.len(), "sending chat request");
        let auth = format!("Bearer {}", self.api_key);
        self.http
            .post_json(&self.chat_url(), request, &[("Authorization", &auth)])
            .await
            .map_err(|e| {
                warn!("chat API error: {e}");
                e
            })
    }

    async fn create_message(&self, request: &MessagesRequest) -> Result<Value> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending messages request"
        );
        self.http
            .post_json(
                &self.messages_url(),
                request,
                &[
                    ("x-api-key", &self.api_key),
                    ("anthropic-version", &self.anthropic_version),
                ],
            )
            .await
            .map_err(|e| {
                warn!("messages API error: {e}");
                e
            })
    }
}
