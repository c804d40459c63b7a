//! Recent-context store.
//!
//! Short-lived facts about what the user is working on, persisted as a single
//! JSON document at `~/.zeptoagent/context.json`. Entries older than
//! `max_age_days` are pruned on every read.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, ZeptoError};

const STORE_VERSION: &str = "1.0";

/// Kind of context fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Manual,
    File,
    Calendar,
    Task,
    TimeTracking,
    Goal,
}

impl ContextType {
    /// Every context type, in declaration order.
    pub const ALL: [ContextType; 6] = [
        ContextType::Manual,
        ContextType::File,
        ContextType::Calendar,
        ContextType::Task,
        ContextType::TimeTracking,
        ContextType::Goal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Manual => "manual",
            ContextType::File => "file",
            ContextType::Calendar => "calendar",
            ContextType::Task => "task",
            ContextType::TimeTracking => "time_tracking",
            ContextType::Goal => "goal",
        }
    }

    /// Section heading used in the recent-context summary.
    fn heading(&self) -> &'static str {
        match self {
            ContextType::Manual => "Manual",
            ContextType::File => "File",
            ContextType::Calendar => "Calendar",
            ContextType::Task => "Task",
            ContextType::TimeTracking => "Time Tracking",
            ContextType::Goal => "Goal",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = ZeptoError;

    fn from_str(s: &str) -> Result<Self> {
        ContextType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = ContextType::ALL.iter().map(|t| t.as_str()).collect();
                ZeptoError::Config(format!(
                    "Unknown context type '{}' (expected one of: {})",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// One stored fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub context_type: ContextType,
    /// Where the fact came from (`user`, `llm_extraction`, ...)
    pub source: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContextStore {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    entries: Vec<ContextEntry>,
}

fn default_version() -> String {
    STORE_VERSION.to_string()
}

impl Default for ContextStore {
    fn default() -> Self {
        Self {
            version: default_version(),
            entries: Vec::new(),
        }
    }
}

/// Counts and age range of stored context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSummary {
    pub total_entries: usize,
    pub by_type: BTreeMap<String, usize>,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// File-backed context store.
///
/// Every operation reads the file, so several handles (the CLI and the
/// background extractor) see each other's writes. A lock serializes the
/// read-modify-write cycles of one handle.
///
/// # Example
///
/// ```rust
/// use serde_json::Map;
/// use zeptoagent::memory::{ContextManager, ContextType};
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = ContextManager::with_path(dir.path().join("context.json"), 7);
/// store
///     .add_context(ContextType::Task, "user", "Finish PR #12", Map::new())
///     .unwrap();
///
/// let summary = store.recent_context_summary(24, 5).unwrap();
/// assert!(summary.contains("  - Finish PR #12"));
/// ```
#[derive(Debug)]
pub struct ContextManager {
    path: PathBuf,
    max_age_days: i64,
    lock: Mutex<()>,
}

impl ContextManager {
    /// Store at `~/.zeptoagent/context.json`.
    pub fn new(max_age_days: i64) -> Self {
        Self::with_path(Config::dir().join("context.json"), max_age_days)
    }

    /// Store at a custom path.
    pub fn with_path(path: impl Into<PathBuf>, max_age_days: i64) -> Self {
        Self {
            path: path.into(),
            max_age_days,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> ContextStore {
        if !self.path.exists() {
            return ContextStore::default();
        }
        let parsed: Result<ContextStore> = std::fs::read_to_string(&self.path)
            .map_err(ZeptoError::from)
            .and_then(|content| serde_json::from_str(&content).map_err(ZeptoError::from));
        match parsed {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not load context store");
                ContextStore::default()
            }
        }
    }

    fn save(&self, store: &ContextStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(store)?)?;
        Ok(())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Append a fact.
    pub fn add_context(
        &self,
        context_type: ContextType,
        source: &str,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Result<ContextEntry> {
        let entry = ContextEntry {
            id: Uuid::new_v4().to_string(),
            context_type,
            source: source.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
            metadata,
        };

        let _guard = self.guard();
        let mut store = self.load();
        store.entries.push(entry.clone());
        self.save(&store)?;
        debug!(context_type = %context_type, source, "Added context entry");
        Ok(entry)
    }

    /// Entries matching the filters, newest first.
    ///
    /// Prunes entries older than `max_age_days` and saves the result.
    pub fn get_context(
        &self,
        context_type: Option<ContextType>,
        max_age_hours: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<ContextEntry>> {
        let _guard = self.guard();
        let mut store = self.load();
        let cutoff = Utc::now() - Duration::days(self.max_age_days);
        store.entries.retain(|e| e.timestamp >= cutoff);
        self.save(&store)?;

        let recent_cutoff = max_age_hours.map(|h| Utc::now() - Duration::hours(h));
        let mut entries: Vec<ContextEntry> = store
            .entries
            .into_iter()
            .filter(|e| context_type.map_or(true, |t| e.context_type == t))
            .filter(|e| recent_cutoff.map_or(true, |c| e.timestamp >= c))
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    /// Remove entries of one type, or all entries. Returns how many were removed.
    pub fn clear_context(&self, context_type: Option<ContextType>) -> Result<usize> {
        let _guard = self.guard();
        let mut store = self.load();
        let before = store.entries.len();
        match context_type {
            Some(t) => store.entries.retain(|e| e.context_type != t),
            None => store.entries.clear(),
        }
        self.save(&store)?;
        Ok(before - store.entries.len())
    }

    pub fn get_context_summary(&self) -> Result<ContextSummary> {
        let entries = self.get_context(None, None, None)?;
        let mut by_type = BTreeMap::new();
        for entry in &entries {
            *by_type.entry(entry.context_type.to_string()).or_insert(0) += 1;
        }
        Ok(ContextSummary {
            total_entries: entries.len(),
            by_type,
            oldest_entry: entries.iter().map(|e| e.timestamp).min(),
            newest_entry: entries.iter().map(|e| e.timestamp).max(),
        })
    }

    /// `Recent Context:` block for the system prompt, or `None` when there is
    /// nothing recent.
    ///
    /// Sections appear in the order Task, File, Calendar, Manual with at most
    /// `per_type_limit` entries each.
    pub fn recent_context_summary(&self, hours: i64, per_type_limit: usize) -> Option<String> {
        let entries = match self.get_context(None, Some(hours), None) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Could not read recent context");
                return None;
            }
        };
        if entries.is_empty() {
            return None;
        }

        let mut lines = vec!["Recent Context:".to_string()];
        for context_type in [
            ContextType::Task,
            ContextType::File,
            ContextType::Calendar,
            ContextType::Manual,
        ] {
            let items: Vec<&ContextEntry> = entries
                .iter()
                .filter(|e| e.context_type == context_type)
                .take(per_type_limit)
                .collect();
            if items.is_empty() {
                continue;
            }
            lines.push(format!("\n{}:", context_type.heading()));
            lines.extend(items.iter().map(|e| format!("  - {}", e.content)));
        }
        Some(lines.join("\n"))
    }
}
