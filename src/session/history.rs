//! Conversation history persistence for ZeptoAgent.
//!
//! History is a flat JSON array of messages at `~/.zeptoagent/messages.json`.
//! System messages are never stored (the prompt is rebuilt every turn) and only
//! the newest `max_messages` entries are kept.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::session::{Message, Role};

/// Default number of messages kept on disk.
pub const DEFAULT_MAX_MESSAGES: usize = 50;

/// Reads and writes the persisted conversation.
#[derive(Debug, Clone)]
pub struct MessageStorage {
    path: PathBuf,
    max_messages: usize,
}

impl MessageStorage {
    /// Storage at the default location (`~/.zeptoagent/messages.json`).
    pub fn new(max_messages: usize) -> Self {
        Self::with_path(Config::dir().join("messages.json"), max_messages)
    }

    /// Storage at a custom path. Useful for tests.
    pub fn with_path(path: impl Into<PathBuf>, max_messages: usize) -> Self {
        Self {
            path: path.into(),
            max_messages,
        }
    }

    /// Location of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `messages`, dropping system messages and keeping the newest
    /// `max_messages`.
    pub fn save(&self, messages: &[Message]) -> Result<()> {
        let kept: Vec<&Message> = messages.iter().filter(|m| m.role != Role::System).collect();
        let start = kept.len().saturating_sub(self.max_messages);
        let kept = &kept[start..];

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(kept)?;
        std::fs::write(&self.path, content)?;
        debug!(path = %self.path.display(), count = kept.len(), "Saved conversation history");
        Ok(())
    }

    /// Load persisted messages.
    ///
    /// A missing or unreadable file yields an empty history. Tool results at
    /// the front whose assistant request was truncated away are dropped.
    pub fn load(&self) -> Vec<Message> {
        if !self.path.exists() {
            return Vec::new();
        }

        let parsed: Result<Vec<Message>> = std::fs::read_to_string(&self.path)
            .map_err(Into::into)
            .and_then(|content| serde_json::from_str(&content).map_err(Into::into));

        match parsed {
            Ok(messages) => {
                let skip = messages
                    .iter()
                    .take_while(|m| m.role == Role::Tool)
                    .count();
                messages
                    .into_iter()
                    .skip(skip)
                    .filter(|m| m.role != Role::System)
                    .collect()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to load conversation history");
                Vec::new()
            }
        }
    }

    /// Erase the stored history.
    pub fn clear(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, "[]")?;
        Ok(())
    }
}

impl Default for MessageStorage {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}
