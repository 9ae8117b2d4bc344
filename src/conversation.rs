//! Ordered conversation log with JSON persistence.
//!
//! The log is append-only: a system message may only open the conversation,
//! and user/assistant messages must carry content. A persisted log is only
//! restored into a session running in the same provider mode.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Which provider a conversation is shaped for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    /// Chat-completion provider; the system prompt travels as a message.
    Chat,
    /// Extended-reasoning provider; the system prompt is a top-level field.
    Reasoning,
}

impl std::fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Reasoning => write!(f, "reasoning"),
        }
    }
}

impl std::str::FromStr for ProviderMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chat" | "a" => Ok(Self::Chat),
            "reasoning" | "b" => Ok(Self::Reasoning),
            other => Err(Error::config(format!("unknown provider mode: {other}"))),
        }
    }
}

/// Outcome of a save. A failed save never aborts the conversation.
#[derive(Debug)]
pub enum PersistOutcome {
    Saved,
    Failed(Error),
}

impl PersistOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

/// On-disk shape of a conversation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredConversation {
    provider_mode: ProviderMode,
    use_web_search: bool,
    last_updated: DateTime<Utc>,
    messages: Vec<Message>,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    mode: ProviderMode,
    web_search: bool,
    last_updated: DateTime<Utc>,
    messages: Vec<Message>,
    default_prompt: String,
}

impl Conversation {
    /// An empty store with no system message.
    pub fn empty(mode: ProviderMode, web_search: bool, default_prompt: impl Into<String>) -> Self {
        Self {
            mode,
            web_search,
            last_updated: Utc::now(),
            messages: Vec::new(),
            default_prompt: default_prompt.into(),
        }
    }

    /// A fresh conversation seeded with the default prompt as its system message.
    pub fn seeded(mode: ProviderMode, web_search: bool, default_prompt: impl Into<String>) -> Self {
        let mut conversation = Self::empty(mode, web_search, default_prompt);
        conversation.seed_system();
        conversation
    }

    fn seed_system(&mut self) {
        self.messages.push(Message {
            role: Role::System,
            content: self.default_prompt.clone(),
        });
    }

    pub fn mode(&self) -> ProviderMode {
        self.mode
    }

    pub fn web_search(&self) -> bool {
        self.web_search
    }

    pub fn set_web_search(&mut self, enabled: bool) {
        self.web_search = enabled;
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        match role {
            Role::System if !self.messages.is_empty() => {
                return Err(Error::invalid_state(
                    "system message must be the first message",
                ));
            }
            Role::User | Role::Assistant if content.trim().is_empty() => {
                return Err(Error::invalid_state(format!(
                    "{} message content is empty",
                    role.as_str()
                )));
            }
            _ => {}
        }
        self.messages.push(Message { role, content });
        Ok(())
    }

    /// Messages shaped for `target`: the reasoning provider carries the
    /// system prompt outside the message list.
    pub fn to_request_messages(&self, target: ProviderMode) -> Vec<Message> {
        match target {
            ProviderMode::Chat => self.messages.clone(),
            ProviderMode::Reasoning => self
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned()
                .collect(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        match self.messages.first() {
            Some(m) if m.role == Role::System => &m.content,
            _ => &self.default_prompt,
        }
    }

    /// Write the conversation to `path`, replacing any previous file atomically.
    pub fn persist(&mut self, path: &Path) -> PersistOutcome {
        self.last_updated = Utc::now();
        match self.write_to(path) {
            Ok(()) => {
                debug!(path = %path.display(), messages = self.messages.len(), "conversation saved");
                PersistOutcome::Saved
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to save conversation");
                PersistOutcome::Failed(e)
            }
        }
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let stored = StoredConversation {
            provider_mode: self.mode,
            use_web_search: self.web_search,
            last_updated: self.last_updated,
            messages: self.messages.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| Error::persistence(format!("serialize conversation: {e}")))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = temp_path(path);
        let mut tmp_file = File::create(&tmp_path)?;
        let written = tmp_file
            .write_all(json.as_bytes())
            .and_then(|()| tmp_file.sync_all());
        drop(tmp_file);

        written
            .and_then(|()| std::fs::rename(&tmp_path, path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp_path);
                Error::persistence(format!("replace {}: {e}", path.display()))
            })
    }

    /// Load a conversation persisted for `expected` mode.
    ///
    /// An absent file, unreadable JSON, a log that breaks the message
    /// invariants, or a different stored mode all yield an empty store.
    pub fn restore(
        path: &Path,
        expected: ProviderMode,
        default_prompt: impl Into<String>,
    ) -> Self {
        let default_prompt = default_prompt.into();
        match read_stored(path) {
            Ok(Some(stored)) if stored.provider_mode == expected => {
                if let Err(e) = check_invariants(&stored.messages) {
                    warn!(path = %path.display(), error = %e, "discarding invalid history");
                    return Self::empty(expected, false, default_prompt);
                }
                debug!(
                    path = %path.display(),
                    messages = stored.messages.len(),
                    "conversation restored"
                );
                Self {
                    mode: expected,
                    web_search: stored.use_web_search,
                    last_updated: stored.last_updated,
                    messages: stored.messages,
                    default_prompt,
                }
            }
            Ok(Some(stored)) => {
                debug!(
                    stored = %stored.provider_mode,
                    expected = %expected,
                    "history belongs to another mode, not loading"
                );
                Self::empty(expected, false, default_prompt)
            }
            Ok(None) => Self::empty(expected, false, default_prompt),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read history");
                Self::empty(expected, false, default_prompt)
            }
        }
    }

    /// Reset to a single system message and remove the backing file.
    pub fn clear(&mut self, path: Option<&Path>) {
        self.messages.clear();
        self.seed_system();
        self.last_updated = Utc::now();
        let Some(path) = path else {
            return;
        };
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), error = %e, "could not remove history file");
            }
            _ => {}
        }
    }
}

fn read_stored(path: &Path) -> Result<Option<StoredConversation>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::parse(format!("history file: {e}")))
}

fn check_invariants(messages: &[Message]) -> Result<()> {
    for (i, m) in messages.iter().enumerate() {
        match m.role {
            Role::System if i != 0 => {
                return Err(Error::invalid_state(format!("system message at index {i}")));
            }
            Role::User | Role::Assistant if m.content.trim().is_empty() => {
                return Err(Error::invalid_state(format!("empty message at index {i}")));
            }
            _ => {}
        }
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "history".into());
    name.push(".tmp");
    path.with_file_name(name)
}
