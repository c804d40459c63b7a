//! Context builder for agent conversations
//!
//! This module provides the `ContextBuilder`, which assembles the system
//! prompt from the base instructions, markdown files in the context directory
//! and the recent entries of the context store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::memory::ContextManager;
use crate::session::Message;

/// Default system prompt for the ZeptoAgent agent
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are ZeptoAgent, a coding assistant working in the user's terminal.

You can read, write and patch files, list and search directories, and run shell commands. Use the tools when a task needs them; never guess at file contents you can read.

Before editing a file, read it. Prefer patch_file for small changes and write_file for new files. Commands and file changes may need the user's approval; when the user denies a call, ask what they want instead of retrying it.

Be concise. When you are done, say what you changed."#;

/// Recent-context settings for the system prompt.
struct RecentContext {
    store: Arc<ContextManager>,
    hours: i64,
    per_type_limit: usize,
}

/// Builder for the system message of a conversation.
///
/// # Example
///
/// ```rust
/// use zeptoagent::agent::ContextBuilder;
/// use zeptoagent::session::Role;
///
/// let builder = ContextBuilder::new().with_system_prompt("You are terse.");
/// let system = builder.build_system_message();
/// assert_eq!(system.role, Role::System);
/// assert_eq!(system.content, "You are terse.");
/// ```
pub struct ContextBuilder {
    system_prompt: String,
    context_dir: Option<PathBuf>,
    recent: Option<RecentContext>,
}

impl ContextBuilder {
    /// Create a new context builder with the default system prompt.
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            context_dir: None,
            recent: None,
        }
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Include the markdown files of `dir` in every system message.
    pub fn with_context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context_dir = Some(dir.into());
        self
    }

    /// Append the `Recent Context:` summary of `store` when it has entries
    /// from the last `hours`.
    pub fn with_recent_context(
        mut self,
        store: Arc<ContextManager>,
        hours: i64,
        per_type_limit: usize,
    ) -> Self {
        self.recent = Some(RecentContext {
            store,
            hours,
            per_type_limit,
        });
        self
    }

    /// Build the system message. Files and the store are read on every call.
    pub fn build_system_message(&self) -> Message {
        let mut sections = vec![self.system_prompt.clone()];
        if let Some(files) = self.context_dir.as_deref().and_then(load_context_files) {
            sections.push(files);
        }
        if let Some(recent) = &self.recent {
            if let Some(summary) = recent
                .store
                .recent_context_summary(recent.hours, recent.per_type_limit)
            {
                sections.push(summary);
            }
        }
        Message::system(&sections.join("\n\n"))
    }

    /// Get the current base prompt.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Concatenate the non-empty `*.md` files of `dir`, sorted by name.
///
/// Each file becomes a `# Context from <file>` block; blocks are separated by
/// `---`. Returns `None` when the directory is missing or has no content.
pub fn load_context_files(dir: &Path) -> Option<String> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();

    let mut parts = Vec::new();
    for path in files {
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let content = content.trim();
                if content.is_empty() {
                    continue;
                }
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                parts.push(format!("# Context from {}\n\n{}", name, content));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read context file");
            }
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n---\n\n"))
    }
}
