//! Tool types for ZeptoAgent
//!
//! This module defines the `Tool` trait that all tools implement, the
//! parameter schema entries they declare, the `ToolContext` handed to each
//! execution and the `ToolOutput` produced at the registry boundary.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::config::expand_home;
use crate::display::{NullSink, OutputEvent, OutputSink};
use crate::error::Result;

use super::confirm::ConfirmationHandler;

/// Turns a successful tool result into a one-line summary for the user.
pub type ResultFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// One declared tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParam {
    /// Parameter name
    pub name: String,
    /// JSON Schema type (`string`, `boolean`, `integer`, `array`, ...)
    pub param_type: String,
    /// Human-readable description sent to the LLM
    pub description: String,
    /// Additional schema keys such as `items` or `enum`
    pub extra: Map<String, Value>,
}

impl ToolParam {
    /// Create a parameter.
    pub fn new(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: param_type.to_string(),
            description: description.to_string(),
            extra: Map::new(),
        }
    }

    /// An array-of-strings parameter.
    pub fn string_list(name: &str, description: &str) -> Self {
        Self::new(name, "array", description).with_extra("items", json!({"type": "string"}))
    }

    /// Attach an extra schema key.
    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// The JSON Schema for this parameter.
    pub fn schema(&self) -> Value {
        let mut schema = self.extra.clone();
        schema.insert("type".to_string(), json!(self.param_type));
        schema.insert("description".to_string(), json!(self.description));
        Value::Object(schema)
    }
}

/// Trait that all tools implement.
///
/// Tools are executed synchronously on the agent thread. Failures are returned
/// as errors and turned into text for the LLM by the registry.
///
/// # Example
///
/// ```rust
/// use serde_json::{json, Value};
/// use zeptoagent::error::Result;
/// use zeptoagent::tools::{Tool, ToolContext, ToolParam};
///
/// struct Shout;
///
/// impl Tool for Shout {
///     fn name(&self) -> &str { "shout" }
///     fn description(&self) -> &str { "Uppercase a message" }
///     fn parameters(&self) -> Vec<ToolParam> {
///         vec![ToolParam::new("message", "string", "Text to shout")]
///     }
///     fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
///         let message = args["message"].as_str().unwrap_or_default();
///         Ok(json!(message.to_uppercase()))
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// Unique tool name used by the LLM.
    fn name(&self) -> &str;

    /// Description sent to the LLM.
    fn description(&self) -> &str;

    /// Declared parameters, in order.
    fn parameters(&self) -> Vec<ToolParam>;

    /// Required parameter names. `None` means every declared parameter.
    fn required(&self) -> Option<Vec<String>> {
        None
    }

    /// Whether the user must approve each call.
    fn requires_confirmation(&self) -> bool {
        false
    }

    /// Custom confirmation flow (e.g. a diff preview).
    fn confirmation_handler(&self) -> Option<Arc<dyn ConfirmationHandler>> {
        None
    }

    /// Summary shown to the user after a successful call.
    fn result_formatter(&self) -> Option<ResultFormatter> {
        None
    }

    /// Run the tool.
    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Execution context handed to tools.
#[derive(Clone)]
pub struct ToolContext {
    /// Base directory for relative paths (process cwd when `None`)
    pub workspace: Option<PathBuf>,
    /// Where user-facing output goes
    pub sink: Arc<dyn OutputSink>,
}

impl ToolContext {
    /// Context that writes to `sink` and resolves paths against the cwd.
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self {
            workspace: None,
            sink,
        }
    }

    /// Resolve relative paths against `workspace`.
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Expand `~` and resolve a relative path against the workspace.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let expanded = expand_home(path);
        match &self.workspace {
            Some(base) if expanded.is_relative() => base.join(expanded),
            _ => expanded,
        }
    }

    /// Emit an event to the user.
    pub fn emit(&self, event: OutputEvent) {
        self.sink.emit(event);
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(Arc::new(NullSink))
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}

/// Result of running a tool through the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// The tool returned a value
    Success(Value),
    /// The tool was missing, failed or panicked
    Error(String),
}

impl ToolOutput {
    /// Text handed back to the LLM.
    ///
    /// String values are used as-is; other values are serialized as JSON.
    pub fn for_llm(&self) -> String {
        match self {
            ToolOutput::Success(Value::String(s)) => s.clone(),
            ToolOutput::Success(value) => value.to_string(),
            ToolOutput::Error(message) => message.clone(),
        }
    }

    /// Whether this output is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutput::Error(_))
    }
}
