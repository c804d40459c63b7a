//! LLM-driven extraction of context facts from a finished turn.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::Result;
use crate::providers::{ChatOptions, LLMProvider, ToolDefinition};
use crate::session::{Message, Role};
use crate::utils::string::prefix_chars;

use super::prompts::{
    extraction_user_prompt, ExecutedTool, CONTEXT_EXTRACTION_PROMPT, EXTRACTION_TOOL_NAME,
};
use super::store::{ContextManager, ContextType};

const FILE_TOOLS: [&str; 3] = ["read_files", "write_file", "patch_file"];
const CALENDAR_KEYWORDS: [&str; 7] = ["deadline", "sprint", "standup", "meeting", "at ", "pm", "am"];
const TASK_KEYWORDS: [&str; 6] = ["pr #", "issue", "ticket", "task", "bug", "feature"];

#[derive(Debug, Deserialize)]
struct ExtractionResult {
    #[serde(default)]
    facts: Vec<String>,
}

/// Mines the latest exchange of a conversation for facts and stores them.
pub struct ContextExtractor {
    provider: Arc<dyn LLMProvider>,
    store: Arc<ContextManager>,
}

impl ContextExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, store: Arc<ContextManager>) -> Self {
        Self { provider, store }
    }

    /// Analyze the last user message and the tool calls that followed it.
    ///
    /// Returns the stored facts. Makes no LLM call when there is nothing to
    /// analyze.
    pub fn extract_from_messages(&self, messages: &[Message]) -> Result<Vec<String>> {
        let last_user = messages.iter().rposition(|m| m.role == Role::User);
        let user_message = last_user.map(|i| messages[i].content.as_str());
        let tools: Vec<ExecutedTool> = messages[last_user.map_or(0, |i| i + 1)..]
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.tool_calls.iter().flatten())
            .map(|call| ExecutedTool {
                name: call.name.clone(),
                arguments: serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({})),
            })
            .collect();

        self.extract_and_store(user_message.filter(|m| !m.is_empty()), &tools)
    }

    fn extract_and_store(
        &self,
        user_message: Option<&str>,
        tools: &[ExecutedTool],
    ) -> Result<Vec<String>> {
        if user_message.is_none() && tools.is_empty() {
            debug!("Nothing to extract context from");
            return Ok(Vec::new());
        }

        let prompt = vec![
            Message::system(CONTEXT_EXTRACTION_PROMPT),
            Message::user(&extraction_user_prompt(user_message, tools)),
        ];
        let response = self.provider.chat(
            &prompt,
            &[extraction_tool()],
            &ChatOptions::new().with_forced_tool(EXTRACTION_TOOL_NAME),
        )?;

        let Some(call) = response.tool_calls.first() else {
            return Ok(Vec::new());
        };
        let result: ExtractionResult = call.parse_arguments()?;

        let mut stored = Vec::new();
        for fact in result.facts.into_iter().filter(|f| !f.trim().is_empty()) {
            let mut metadata = Map::new();
            metadata.insert(
                "user_message".to_string(),
                user_message.map_or(Value::Null, |m| Value::String(prefix_chars(m, 100))),
            );
            metadata.insert("extraction_method".to_string(), json!("llm"));

            self.store.add_context(
                determine_context_type(&fact, tools),
                "llm_extraction",
                &fact,
                metadata,
            )?;
            stored.push(fact);
        }
        info!(facts = stored.len(), "Extracted context");
        Ok(stored)
    }
}

fn extraction_tool() -> ToolDefinition {
    ToolDefinition::new(
        EXTRACTION_TOOL_NAME,
        "Extract context facts from the interaction",
        json!({
            "type": "object",
            "properties": {
                "facts": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "List of extracted context facts"
                }
            },
            "required": ["facts"]
        }),
    )
}

/// Classify a fact: file tools win, then calendar keywords, then task keywords.
pub fn determine_context_type(fact: &str, tools: &[ExecutedTool]) -> ContextType {
    if tools.iter().any(|t| FILE_TOOLS.contains(&t.name.as_str())) {
        return ContextType::File;
    }
    let lower = fact.to_lowercase();
    if CALENDAR_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ContextType::Calendar;
    }
    if TASK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ContextType::Task;
    }
    ContextType::Manual
}
