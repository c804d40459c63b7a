//! Configuration type definitions for ZeptoAgent
//!
//! This module defines all configuration structs used throughout the agent.
//! All types implement serde traits for JSON serialization and have sensible defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default model when neither config nor environment names one.
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Default OpenAI-compatible chat completions base URL.
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";

/// Main configuration struct for ZeptoAgent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// LLM transport configuration
    pub llm: LlmConfig,
    /// Agent loop configuration (iteration cap, history size, prompt)
    pub agent: AgentConfig,
    /// Recent-context store and extraction configuration
    pub context: ContextConfig,
    /// External tool servers keyed by name
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
    /// Skip starting MCP servers entirely
    pub mcp_disabled: bool,
    /// Logging configuration
    pub logging: LoggingConfig,
}

// ============================================================================
// LLM Configuration
// ============================================================================

/// LLM transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key for the LLM service
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible chat completions API
    pub api_base: String,
    /// Model identifier
    pub model: String,
    /// Maximum tokens per completion (provider default when unset)
    pub max_tokens: Option<u32>,
    /// Sampling temperature (provider default when unset)
    pub temperature: Option<f32>,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            temperature: None,
            timeout_secs: 120,
        }
    }
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Agent loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum LLM round trips with tool calls per turn
    pub max_tool_iterations: usize,
    /// Maximum number of persisted conversation messages
    pub max_messages: usize,
    /// Replaces the built-in base instructions when set
    pub system_prompt: Option<String>,
    /// Directory of markdown context files (default: `<cwd>/context`)
    pub context_dir: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 20,
            max_messages: 50,
            system_prompt: None,
            context_dir: None,
        }
    }
}

// ============================================================================
// Context Configuration
// ============================================================================

/// Recent-context store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Run background fact extraction after each turn
    pub enabled: bool,
    /// Entries older than this are pruned on every read
    pub max_age_days: i64,
    /// Window for the summary injected into the system prompt
    pub recent_hours: i64,
    /// Maximum entries shown per context type in the summary
    pub per_type_limit: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_days: 7,
            recent_hours: 24,
            per_type_limit: 5,
        }
    }
}

// ============================================================================
// MCP Configuration
// ============================================================================

/// Configuration for a single MCP server launched over stdio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command to execute the server
    pub command: String,
    /// Arguments passed to the command
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the server process
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl McpServerConfig {
    /// Create a server config with no arguments or environment.
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Set the argument list.
    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, coloured
    Pretty,
    /// Compact single-line text
    #[default]
    Component,
    /// JSON lines
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Append logs to this file instead of stderr
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "warn".to_string(),
            file: None,
        }
    }
}
