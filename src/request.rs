//! Provider request payloads built from a conversation.
//!
//! Pure transforms: nothing here touches the network.

use crate::config::{ApproximateLocation, ChatConfig, MIN_THINKING_BUDGET, ReasoningConfig};
use crate::conversation::{Conversation, Message, ProviderMode};
use serde::Serialize;

// -- Chat completions (provider A) --

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// The search model variant rejects this field, so it is omitted there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<WebSearchOptions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSearchOptions {
    pub search_context_size: String,
    pub user_location: UserLocation,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserLocation {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub approximate: ApproximateLocation,
}

pub fn build_chat_request(
    conversation: &Conversation,
    config: &ChatConfig,
    web_search: bool,
) -> ChatCompletionRequest {
    let messages = conversation.to_request_messages(ProviderMode::Chat);
    if web_search {
        ChatCompletionRequest {
            model: config.search_model.clone(),
            messages,
            temperature: None,
            web_search_options: Some(WebSearchOptions {
                search_context_size: config.search_context_size.clone(),
                user_location: UserLocation {
                    kind: "approximate",
                    approximate: config.location.clone(),
                },
            }),
        }
    } else {
        ChatCompletionRequest {
            model: config.model.clone(),
            messages,
            temperature: Some(config.temperature),
            web_search_options: None,
        }
    }
}

// -- Messages with extended thinking (provider B) --

#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
    pub thinking: ThinkingConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,
}

impl MessagesRequest {
    /// Same payload addressed to a different model id.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThinkingConfig {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub budget_tokens: u32,
}

/// Hosted tool the provider runs itself; we only declare it.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub max_uses: u32,
}

pub fn build_messages_request(
    conversation: &Conversation,
    config: &ReasoningConfig,
    web_search: bool,
) -> MessagesRequest {
    let mut tools = Vec::new();
    if web_search {
        tools.push(ToolDescriptor {
            kind: config.web_search_tool.clone(),
            name: "web_search".into(),
            max_uses: config.web_search_max_uses,
        });
    }

    MessagesRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        system: conversation.system_prompt().to_string(),
        messages: conversation.to_request_messages(ProviderMode::Reasoning),
        thinking: ThinkingConfig {
            kind: "enabled",
            budget_tokens: config.thinking_budget.max(MIN_THINKING_BUDGET),
        },
        tools,
    }
}
