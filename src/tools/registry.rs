//! Tool registry for ZeptoAgent
//!
//! This module provides the `ToolRegistry` struct for managing and executing
//! tools. Tools can be registered, looked up by name, exported as LLM schemas
//! and executed with failure containment: a missing tool, an error or a panic
//! inside a tool all come back as [`ToolOutput::Error`] text.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::providers::ToolDefinition;

use super::confirm::ConfirmationHandler;
use super::{ResultFormatter, Tool, ToolContext, ToolOutput};

#[derive(Default)]
struct Entries {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

/// A registry that holds and manages tools.
///
/// Registration order is preserved when exporting schemas. The registry is
/// shared behind an `Arc` and guarded by a lock so tools discovered from MCP
/// servers can be added while other code holds a reference.
///
/// # Example
///
/// ```rust
/// use zeptoagent::tools::{register_builtin_tools, ToolRegistry};
///
/// let registry = ToolRegistry::new();
/// register_builtin_tools(&registry);
///
/// assert!(registry.has("read_files"));
/// assert!(registry.requires_confirmation("write_file"));
/// assert!(registry.requires_confirmation("no_such_tool"));
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    entries: RwLock<Entries>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        let mut entries = self.write();
        if entries.tools.insert(name.clone(), tool).is_none() {
            entries.order.push(name);
        }
    }

    /// Remove a tool, returning whether it was present.
    pub fn remove(&self, name: &str) -> bool {
        let mut entries = self.write();
        let removed = entries.tools.remove(name).is_some();
        if removed {
            entries.order.retain(|n| n != name);
        }
        removed
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.read().tools.get(name).cloned()
    }

    /// Check whether a tool is registered.
    pub fn has(&self, name: &str) -> bool {
        self.read().tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.read().tools.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read().order.clone()
    }

    fn ordered(&self) -> Vec<Arc<dyn Tool>> {
        let entries = self.read();
        entries
            .order
            .iter()
            .filter_map(|name| entries.tools.get(name).cloned())
            .collect()
    }

    /// Tool definitions for use with LLM providers.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.ordered()
            .iter()
            .map(|tool| {
                ToolDefinition::new(tool.name(), tool.description(), parameters_schema(tool.as_ref()))
            })
            .collect()
    }

    /// Every tool in the chat-completions function schema format:
    /// `{type: "function", function: {name, description, parameters}}`.
    pub fn describe_all(&self) -> Vec<Value> {
        self.definitions()
            .into_iter()
            .map(|def| {
                json!({
                    "type": "function",
                    "function": {
                        "name": def.name,
                        "description": def.description,
                        "parameters": def.parameters,
                    }
                })
            })
            .collect()
    }

    /// Whether `name` needs user approval. Unknown tools always do.
    pub fn requires_confirmation(&self, name: &str) -> bool {
        self.get(name)
            .map(|tool| tool.requires_confirmation())
            .unwrap_or(true)
    }

    /// The tool's custom confirmation handler, if any.
    pub fn confirmation_handler(&self, name: &str) -> Option<Arc<dyn ConfirmationHandler>> {
        self.get(name).and_then(|tool| tool.confirmation_handler())
    }

    /// The tool's result formatter, if any.
    pub fn format_result(&self, name: &str) -> Option<ResultFormatter> {
        self.get(name).and_then(|tool| tool.result_formatter())
    }

    /// Execute a tool by name.
    ///
    /// Never fails: unknown tools, tool errors and panics are reported as
    /// [`ToolOutput::Error`]. The registry lock is released before the tool
    /// runs.
    pub fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolOutput {
        let Some(tool) = self.get(name) else {
            return ToolOutput::Error(format!("Error: Tool '{}' not found", name));
        };

        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| tool.execute(args, ctx)));
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(value)) => {
                info!(tool = name, duration_ms, "Tool executed successfully");
                ToolOutput::Success(value)
            }
            Ok(Err(e)) => {
                error!(tool = name, error = %e, duration_ms, "Tool execution failed");
                ToolOutput::Error(format!("Error executing tool '{}': {}", name, e))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = name, error = %message, duration_ms, "Tool panicked");
                ToolOutput::Error(format!("Error executing tool '{}': {}", name, message))
            }
        }
    }
}

/// The `{type: "object", properties, required}` schema for a tool.
fn parameters_schema(tool: &dyn Tool) -> Value {
    let params = tool.parameters();
    let mut properties = Map::new();
    for param in &params {
        properties.insert(param.name.clone(), param.schema());
    }
    let required = tool
        .required()
        .unwrap_or_else(|| params.iter().map(|p| p.name.clone()).collect());

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ZeptoError};
    use crate::tools::ToolParam;

    struct EchoTool;

    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo a message"
        }
        fn parameters(&self) -> Vec<ToolParam> {
            vec![
                ToolParam::new("message", "string", "Text to echo"),
                ToolParam::new("loud", "boolean", "Uppercase it"),
            ]
        }
        fn required(&self) -> Option<Vec<String>> {
            Some(vec!["message".to_string()])
        }
        fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
            Ok(args["message"].clone())
        }
    }

    struct FailingTool;

    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> Vec<ToolParam> {
            vec![]
        }
        fn requires_confirmation(&self) -> bool {
            true
        }
        fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
            Err(ZeptoError::Tool("disk on fire".to_string()))
        }
    }

    #[test]
    fn test_register_and_execute() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        assert!(registry.has("echo"));
        assert_eq!(registry.len(), 1);
        let output = registry.execute("echo", json!({"message": "hi"}), &ToolContext::default());
        assert_eq!(output, ToolOutput::Success(json!("hi")));
    }

    #[test]
    fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        assert!(registry.requires_confirmation("ghost"));
        assert!(registry.confirmation_handler("ghost").is_none());
        assert!(registry.format_result("ghost").is_none());

        let output = registry.execute("ghost", json!({}), &ToolContext::default());
        assert!(output.is_error());
        assert!(output.for_llm().contains("ghost"));
    }

    #[test]
    fn test_error_becomes_output() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool));

        let output = registry.execute("failing", json!({}), &ToolContext::default());
        assert_eq!(
            output.for_llm(),
            "Error executing tool 'failing': Tool error: disk on fire"
        );
    }

    #[test]
    fn test_register_overwrites_and_keeps_order() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(FailingTool));
        registry.register(Arc::new(EchoTool));

        assert_eq!(registry.names(), vec!["echo", "failing"]);
        assert!(registry.remove("echo"));
        assert!(!registry.remove("echo"));
        assert_eq!(registry.names(), vec!["failing"]);
    }

    #[test]
    fn test_describe_all_schema() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(FailingTool));

        let described = registry.describe_all();
        assert_eq!(
            described[0],
            json!({
                "type": "function",
                "function": {
                    "name": "echo",
                    "description": "Echo a message",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "message": {"type": "string", "description": "Text to echo"},
                            "loud": {"type": "boolean", "description": "Uppercase it"}
                        },
                        "required": ["message"]
                    }
                }
            })
        );
        assert_eq!(described[1]["function"]["parameters"]["required"], json!([]));

        let keys: Vec<&String> = described[0]["function"]["parameters"]["properties"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(keys, vec!["message", "loud"]);
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "tool panicked");
    }
}
