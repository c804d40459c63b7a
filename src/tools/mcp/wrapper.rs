//! MCP tool wrapper - adapts MCP server tools to the ZeptoAgent Tool trait.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::manager::McpServerManager;
use super::protocol::McpTool;
use crate::error::Result;
use crate::tools::{announce, ResultFormatter, Tool, ToolContext, ToolParam, ToolRegistry};

/// Wraps a single MCP tool as a ZeptoAgent `Tool` implementation.
pub struct McpToolWrapper {
    /// Server the tool lives on.
    server: String,
    /// Tool name, as advertised by the server.
    name: String,
    description: String,
    params: Vec<ToolParam>,
    required: Vec<String>,
    manager: Arc<McpServerManager>,
}

impl McpToolWrapper {
    /// Create a wrapper from a `tools/list` entry.
    pub fn new(server: &str, tool: &McpTool, manager: Arc<McpServerManager>) -> Self {
        let (params, required) = convert_schema(&tool.input_schema);
        Self {
            server: server.to_string(),
            name: tool.name.clone(),
            description: tool.description.clone(),
            params,
            required,
            manager,
        }
    }

    /// The server this tool is called on.
    pub fn server(&self) -> &str {
        &self.server
    }
}

impl Tool for McpToolWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<ToolParam> {
        self.params.clone()
    }

    fn required(&self) -> Option<Vec<String>> {
        Some(self.required.clone())
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn result_formatter(&self) -> Option<ResultFormatter> {
        Some(Arc::new(|_: &Value| "✓ Tool executed".to_string()))
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        announce(ctx, &self.name, &args);
        match self.manager.call_tool(&self.server, &self.name, args) {
            Ok(result) => Ok(first_text(&result).map(Value::String).unwrap_or(result)),
            Err(e) => {
                warn!(server = %self.server, tool = %self.name, error = %e, "MCP tool failed");
                Ok(json!({ "error": format!("MCP tool '{}' failed: {}", self.name, e) }))
            }
        }
    }
}

/// Text of the first content item, when the result has one.
fn first_text(result: &Value) -> Option<String> {
    result
        .as_array()?
        .first()?
        .get("text")?
        .as_str()
        .map(String::from)
}

/// Convert an MCP `inputSchema` into declared parameters and the required list.
///
/// Missing descriptions become `Parameter: <name>` and missing types become
/// `string`; other property keys are kept.
pub fn convert_schema(schema: &Value) -> (Vec<ToolParam>, Vec<String>) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return (Vec::new(), Vec::new());
    };

    let params = properties
        .iter()
        .map(|(name, prop)| {
            let mut extra: Map<String, Value> = prop.as_object().cloned().unwrap_or_default();
            let param_type = extra
                .remove("type")
                .and_then(|t| t.as_str().map(String::from))
                .unwrap_or_else(|| "string".to_string());
            let description = extra
                .remove("description")
                .and_then(|d| d.as_str().map(String::from))
                .unwrap_or_else(|| format!("Parameter: {}", name));
            ToolParam {
                name: name.clone(),
                param_type,
                description,
                extra,
            }
        })
        .collect();

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    (params, required)
}

/// Registers the tools of MCP servers into a [`ToolRegistry`].
pub struct McpToolAdapter {
    manager: Arc<McpServerManager>,
}

impl McpToolAdapter {
    pub fn new(manager: Arc<McpServerManager>) -> Self {
        Self { manager }
    }

    /// List a running server's tools and register each one.
    ///
    /// Returns the registered tool names.
    pub fn discover_and_register(&self, server: &str, registry: &ToolRegistry) -> Result<Vec<String>> {
        let tools = self.manager.list_tools(server)?;
        let mut names = Vec::with_capacity(tools.len());
        for tool in &tools {
            let wrapper = McpToolWrapper::new(server, tool, Arc::clone(&self.manager));
            names.push(tool.name.clone());
            registry.register(Arc::new(wrapper));
        }
        info!(server = %server, tools = names.len(), "Registered MCP tools");
        Ok(names)
    }

    /// Start every configured server and register its tools.
    ///
    /// A server that fails is reported through `on_error` and skipped.
    pub fn start_all(&self, registry: &ToolRegistry, mut on_error: impl FnMut(&str, &str)) -> usize {
        let mut registered = 0;
        for server in self.manager.server_names().to_vec() {
            let result = self
                .manager
                .start_server(&server)
                .and_then(|_| self.discover_and_register(&server, registry));
            match result {
                Ok(names) => registered += names.len(),
                Err(e) => {
                    warn!(server = %server, error = %e, "Skipping MCP server");
                    on_error(&server, &e.to_string());
                }
            }
        }
        registered
    }
}
