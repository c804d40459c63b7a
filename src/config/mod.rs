//! Configuration management for ZeptoAgent
//!
//! Configuration is loaded from `~/.zeptoagent/config.json`, merged with MCP
//! server definitions from `~/.zeptoagent/mcp_servers.json`, and finally
//! overridden by environment variables.

mod types;

pub use types::*;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, ZeptoError};

impl Config {
    /// Returns the ZeptoAgent state directory path (~/.zeptoagent)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".zeptoagent")
    }

    /// Returns the path to the config file (~/.zeptoagent/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Returns the path to the MCP server file (~/.zeptoagent/mcp_servers.json)
    pub fn mcp_servers_path() -> PathBuf {
        Self::dir().join("mcp_servers.json")
    }

    /// Load configuration from the default paths with environment overrides.
    ///
    /// Missing files yield defaults. Environment variables override file values.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&Self::path())?;
        config.merge_mcp_servers(load_mcp_servers(&Self::mcp_servers_path()));
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path, without environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            ZeptoError::Config(format!("Invalid config file {}: {}", path.display(), e))
        })
    }

    /// Add servers from a separate server map. Entries already present win.
    pub fn merge_mcp_servers(&mut self, servers: BTreeMap<String, McpServerConfig>) {
        for (name, server) in servers {
            self.mcp_servers.entry(name).or_insert(server);
        }
    }

    /// Apply environment variable overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply environment variable overrides using `lookup` to read variables.
    ///
    /// `ANTHROPIC_API_KEY` and `LLM_MODEL` are honoured for compatibility;
    /// the `ZEPTOAGENT_*` names take precedence over them.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("ANTHROPIC_API_KEY") {
            self.llm.api_key = Some(val);
        }
        if let Some(val) = lookup("ZEPTOAGENT_LLM_API_KEY") {
            self.llm.api_key = Some(val);
        }
        if let Some(val) = lookup("LLM_MODEL") {
            self.llm.model = val;
        }
        if let Some(val) = lookup("ZEPTOAGENT_LLM_MODEL") {
            self.llm.model = val;
        }
        if let Some(val) = lookup("ZEPTOAGENT_LLM_API_BASE") {
            self.llm.api_base = val;
        }
        if let Some(val) = lookup("ZEPTOAGENT_MAX_TOOL_ITERATIONS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tool_iterations = v;
            }
        }
        if let Some(val) = lookup("ZEPTOAGENT_DISABLE_MCP") {
            self.mcp_disabled = val.eq_ignore_ascii_case("true");
        }
        if let Some(val) = lookup("ZEPTOAGENT_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Context directory for markdown prompt files.
    pub fn context_dir(&self) -> PathBuf {
        match &self.agent.context_dir {
            Some(dir) => expand_home(dir),
            None => std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("context"),
        }
    }
}

/// Load an MCP server map (`{name: {command, args, env}}`) from a JSON file.
///
/// A missing file yields an empty map. An invalid file is logged and ignored.
pub fn load_mcp_servers(path: &Path) -> BTreeMap<String, McpServerConfig> {
    if !path.exists() {
        return BTreeMap::new();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(ZeptoError::from)
        .and_then(|content| serde_json::from_str(&content).map_err(ZeptoError::from));
    match parsed {
        Ok(servers) => servers,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load MCP server config");
            BTreeMap::new()
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path.is_empty() {
        return PathBuf::from(path);
    }

    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            if path.len() > 1 && path.chars().nth(1) == Some('/') {
                return home.join(&path[2..]);
            }
            if path.len() == 1 {
                return home;
            }
        }
    }

    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.llm.model, "claude-3-haiku-20240307");
        assert_eq!(config.llm.api_base, DEFAULT_API_BASE);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.agent.max_tool_iterations, 20);
        assert_eq!(config.agent.max_messages, 50);
        assert_eq!(config.context.max_age_days, 7);
        assert_eq!(config.context.per_type_limit, 5);
        assert!(config.mcp_servers.is_empty());
        assert!(!config.mcp_disabled);
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{"llm": {"model": "gpt-4o"}, "agent": {"max_messages": 10}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.timeout_secs, 120); // Default
        assert_eq!(config.agent.max_messages, 10);
        assert_eq!(config.agent.max_tool_iterations, 20); // Default
    }

    #[test]
    fn test_mcp_server_config_defaults() {
        let json = r#"{"mcp_servers": {"fs": {"command": "npx"}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let fs = &config.mcp_servers["fs"];
        assert_eq!(fs.command, "npx");
        assert!(fs.args.is_empty());
        assert!(fs.env.is_empty());
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_env_overrides_from(env_from(&[
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("LLM_MODEL", "claude-3-5-sonnet"),
            ("ZEPTOAGENT_MAX_TOOL_ITERATIONS", "5"),
            ("ZEPTOAGENT_DISABLE_MCP", "TRUE"),
        ]));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-ant"));
        assert_eq!(config.llm.model, "claude-3-5-sonnet");
        assert_eq!(config.agent.max_tool_iterations, 5);
        assert!(config.mcp_disabled);
    }

    #[test]
    fn test_env_override_prefixed_wins() {
        let mut config = Config::default();
        config.apply_env_overrides_from(env_from(&[
            ("ANTHROPIC_API_KEY", "generic"),
            ("ZEPTOAGENT_LLM_API_KEY", "specific"),
        ]));
        assert_eq!(config.llm.api_key.as_deref(), Some("specific"));
    }

    #[test]
    fn test_env_override_ignores_bad_numbers() {
        let mut config = Config::default();
        config.apply_env_overrides_from(env_from(&[
            ("ZEPTOAGENT_MAX_TOOL_ITERATIONS", "many"),
            ("ZEPTOAGENT_DISABLE_MCP", "yes"),
        ]));
        assert_eq!(config.agent.max_tool_iterations, 20);
        assert!(!config.mcp_disabled);
    }

    #[test]
    fn test_load_nonexistent() {
        let config = Config::load_from_path(Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(config.llm.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_load_invalid_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ZeptoError::Config(_)));
    }

    #[test]
    fn test_load_mcp_servers_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mcp_servers.json");
        std::fs::write(
            &path,
            r#"{"files": {"command": "npx", "args": ["-y", "server-fs"], "env": {"A": "1"}}}"#,
        )
        .unwrap();

        let servers = load_mcp_servers(&path);
        assert_eq!(servers.len(), 1);
        assert_eq!(servers["files"].args, vec!["-y", "server-fs"]);
        assert_eq!(servers["files"].env["A"], "1");
    }

    #[test]
    fn test_load_mcp_servers_invalid_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mcp_servers.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(load_mcp_servers(&path).is_empty());
        assert!(load_mcp_servers(&dir.path().join("missing.json")).is_empty());
    }

    #[test]
    fn test_merge_keeps_existing_entries() {
        let mut config = Config::default();
        config
            .mcp_servers
            .insert("fs".into(), McpServerConfig::new("from-config"));

        let mut extra = BTreeMap::new();
        extra.insert("fs".to_string(), McpServerConfig::new("from-file"));
        extra.insert("git".to_string(), McpServerConfig::new("uvx"));
        config.merge_mcp_servers(extra);

        assert_eq!(config.mcp_servers["fs"].command, "from-config");
        assert_eq!(config.mcp_servers["git"].command, "uvx");
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~/.zeptoagent"), home.join(".zeptoagent"));
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
        assert_eq!(expand_home(""), PathBuf::from(""));
    }

    #[test]
    fn test_config_dir_and_paths() {
        let dir = Config::dir();
        assert!(dir.ends_with(".zeptoagent"));
        assert_eq!(Config::path(), dir.join("config.json"));
        assert_eq!(Config::mcp_servers_path(), dir.join("mcp_servers.json"));
    }

    #[test]
    fn test_logging_config_defaults() {
        let cfg: LoggingConfig = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "warn");
        assert!(cfg.file.is_none());
    }
}
