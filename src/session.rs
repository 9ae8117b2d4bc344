//! One interactive conversation in a single provider mode.
//!
//! A turn runs to completion before the next input is accepted:
//! build request, call the provider (through the fallback resolver in
//! reasoning mode), normalize, append the answer, persist.

use crate::config::Config;
use crate::conversation::{Conversation, PersistOutcome, ProviderMode, Role};
use crate::error::Result;
use crate::fallback::ModelFallbackResolver;
use crate::llm::Backend;
use crate::normalize::{NormalizedResponse, block_type_tags, normalize};
use crate::request::{build_chat_request, build_messages_request};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Input that ends a mode's loop.
pub const EXIT_SENTINEL: &str = "exit";
/// Input that resets the conversation.
pub const CLEAR_COMMAND: &str = "/clear";

#[derive(Debug)]
pub enum TurnOutcome {
    /// Empty input; nothing happened.
    Skipped,
    Exit,
    Cleared,
    Completed(TurnReport),
}

#[derive(Debug)]
pub struct TurnReport {
    pub normalized: NormalizedResponse,
    /// Model id that produced the response.
    pub model: String,
    /// Whether an assistant message was appended.
    pub stored: bool,
    pub persisted: bool,
    /// Raw block types, set in reasoning mode when no reasoning was found.
    pub block_tags: Option<Vec<String>>,
}

pub struct ChatSession<B> {
    config: Config,
    conversation: Conversation,
    backend: B,
    resolver: ModelFallbackResolver,
    history_path: Option<PathBuf>,
}

impl<B: Backend> ChatSession<B> {
    /// Restore the persisted conversation for `mode`, or seed a fresh one.
    pub fn start(config: &Config, mode: ProviderMode, web_search: bool, backend: B) -> Self {
        let history_path = config
            .session
            .persist
            .then(|| config.session.history_file.clone());
        let prompt = config.session.system_prompt.clone();

        let mut conversation = match &history_path {
            Some(path) => Conversation::restore(path, mode, prompt.clone()),
            None => Conversation::empty(mode, web_search, prompt.clone()),
        };
        if conversation.is_empty() {
            conversation = Conversation::seeded(mode, web_search, prompt);
        } else {
            info!(messages = conversation.len(), mode = %mode, "resuming saved conversation");
        }
        conversation.set_web_search(web_search);

        Self {
            config: config.clone(),
            conversation,
            backend,
            resolver: ModelFallbackResolver::new(config.reasoning.fallback_models.clone()),
            history_path,
        }
    }

    pub fn mode(&self) -> ProviderMode {
        self.conversation.mode()
    }

    pub fn web_search(&self) -> bool {
        self.conversation.web_search()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn history_path(&self) -> Option<&Path> {
        self.history_path.as_deref()
    }

    /// Handle one line of user input.
    ///
    /// Errors abandon the turn only; the session stays usable. The user
    /// message of a failed turn stays in the log.
    pub async fn submit(&mut self, input: &str) -> Result<TurnOutcome> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(TurnOutcome::Skipped);
        }
        if input.eq_ignore_ascii_case(EXIT_SENTINEL) {
            return Ok(TurnOutcome::Exit);
        }
        if input.eq_ignore_ascii_case(CLEAR_COMMAND) {
            self.conversation.clear(self.history_path.as_deref());
            info!("conversation cleared");
            return Ok(TurnOutcome::Cleared);
        }

        self.conversation.append(Role::User, input)?;

        let mode = self.mode();
        let web_search = self.web_search();
        let (model, response) = match mode {
            ProviderMode::Chat => {
                let request = build_chat_request(&self.conversation, &self.config.chat, web_search);
                let response = self.backend.complete_chat(&request).await?;
                (request.model, response)
            }
            ProviderMode::Reasoning => {
                let request =
                    build_messages_request(&self.conversation, &self.config.reasoning, web_search);
                let backend = &self.backend;
                let resolved = self
                    .resolver
                    .resolve(&request, |req| async move { backend.create_message(&req).await })
                    .await?;
                (resolved.model, resolved.response)
            }
        };

        let normalized = normalize(mode, &response);
        for tool in &normalized.tool_invocations {
            info!(tool = %tool.name, "model invoked a tool");
        }

        let block_tags = (mode == ProviderMode::Reasoning
            && normalized.reasoning_segments.is_empty())
        .then(|| block_type_tags(&response));
        if let Some(tags) = &block_tags {
            debug!(?tags, "no reasoning blocks in response");
        }

        let answer = normalized.answer();
        let stored = !answer.trim().is_empty();
        let mut persisted = false;
        if stored {
            self.conversation.append(Role::Assistant, answer)?;
            persisted = self.persist();
        } else if !normalized.tool_invocations.is_empty() {
            info!(
                tools = normalized.tool_invocations.len(),
                "tool-only response, nothing stored"
            );
        }

        Ok(TurnOutcome::Completed(TurnReport {
            normalized,
            model,
            stored,
            persisted,
            block_tags,
        }))
    }

    /// Save on an interrupt-driven exit.
    pub fn interrupt(&mut self) -> bool {
        debug!("session interrupted");
        self.persist()
    }

    fn persist(&mut self) -> bool {
        match &self.history_path {
            Some(path) => matches!(self.conversation.persist(path), PersistOutcome::Saved),
            None => false,
        }
    }
}
