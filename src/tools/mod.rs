//! Tools module - Tool definitions and execution for LLM function calling
//!
//! This module provides the infrastructure for defining and executing tools
//! that the LLM can call during a turn, plus the built-in tool set.
//!
//! # Overview
//!
//! - `Tool` trait: The interface that all tools must implement
//! - `ToolContext`: Execution context (workspace, output sink)
//! - `ToolRegistry`: Central registry for managing and executing tools
//! - `Prompter` / `ConfirmationHandler`: user approval before side effects
//!
//! # Built-in Tools
//!
//! - `ReadFilesTool`, `WriteFileTool`, `PatchFileTool`, `ListDirectoryTool`
//! - `GlobFilesTool`, `GrepFilesTool`
//! - `ExecuteCommandTool`
//!
//! Tools discovered on MCP servers are registered next to these through
//! [`mcp::McpToolAdapter`].
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use zeptoagent::tools::{register_builtin_tools, ToolContext, ToolRegistry};
//!
//! let registry = ToolRegistry::new();
//! register_builtin_tools(&registry);
//! assert_eq!(registry.len(), 7);
//!
//! let output = registry.execute(
//!     "glob_files",
//!     json!({"pattern": "*.does-not-exist"}),
//!     &ToolContext::default(),
//! );
//! assert_eq!(output.for_llm(), "[]");
//! ```

pub mod confirm;
pub mod diff;
pub mod filesystem;
pub mod mcp;
mod registry;
pub mod search;
pub mod shell;
mod types;

pub use confirm::{
    default_confirm, is_affirmative, ConfirmationHandler, Prompter, ScriptedPrompter,
    StdinPrompter,
};
pub use registry::ToolRegistry;
pub use types::{ResultFormatter, Tool, ToolContext, ToolOutput, ToolParam};

use std::sync::Arc;

use serde_json::Value;

use crate::display::OutputEvent;
use crate::error::{Result, ZeptoError};
use crate::utils::string::format_tool_args;

/// Register the built-in file, search and shell tools.
pub fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(filesystem::ReadFilesTool));
    registry.register(Arc::new(filesystem::WriteFileTool));
    registry.register(Arc::new(filesystem::PatchFileTool));
    registry.register(Arc::new(filesystem::ListDirectoryTool));
    registry.register(Arc::new(search::GlobFilesTool));
    registry.register(Arc::new(search::GrepFilesTool));
    registry.register(Arc::new(shell::ExecuteCommandTool));
}

/// Show `name(args)` to the user before a tool runs.
pub(crate) fn announce(ctx: &ToolContext, name: &str, args: &Value) {
    ctx.emit(OutputEvent::ToolCall(format!(
        "{}({})",
        name,
        format_tool_args(args)
    )));
}

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ZeptoError::Tool(format!("Missing '{}' argument", key)))
}

pub(crate) fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn opt_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Non-negative integer argument. Negative or non-integer values use `default`.
pub(crate) fn opt_usize(args: &Value, key: &str, default: usize) -> usize {
    args.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

/// An array-of-strings argument. Any other shape is an error.
pub(crate) fn string_list(args: &Value, key: &str) -> Result<Vec<String>> {
    let items = args
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ZeptoError::Tool(format!("'{}' must be a list of strings", key)))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(String::from)
                .ok_or_else(|| ZeptoError::Tool(format!("'{}' must be a list of strings", key)))
        })
        .collect()
}
