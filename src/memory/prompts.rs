//! Prompts for background context extraction.

use serde_json::Value;

use crate::utils::string::suffix_chars;

/// System prompt for the extraction call.
pub const CONTEXT_EXTRACTION_PROMPT: &str = r#"You extract durable facts from a single interaction between a user and a coding agent. The facts help decide what the user should work on next.

Look for:
- Client, project or product being worked on
- Tasks, pull requests, issues or tickets (keep their numbers)
- Files being read, written or patched and the code areas involved
- Deadlines, meetings, sprint goals and other time constraints
- Blockers and things waiting on other people
- Recurring preferences in how the user works

Rules:
- Use only what the user said and the tools that ran
- Be specific: "Working on API refactor PR #234", not "Working on code"
- One standalone statement per fact
- Skip small talk; return an empty list when nothing is worth keeping

Examples:
User: "I have a standup at 2pm for the mobile app, need to finish PR #234 before then"
Facts: ["Project: mobile app", "Has standup at 2pm", "Working on PR #234"]

User: "Read src/api/routes.py"
Tool: read_files(file_paths=['src/api/routes.py'])
Facts: ["Reviewing src/api/routes.py"]

User: "What's the weather like?"
Facts: []

Report the facts by calling the extract_context tool."#;

/// Name of the forced extraction tool.
pub const EXTRACTION_TOOL_NAME: &str = "extract_context";

/// A tool call seen in the interaction being analyzed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTool {
    pub name: String,
    pub arguments: Value,
}

/// The user prompt describing one interaction.
pub fn extraction_user_prompt(user_message: Option<&str>, tools: &[ExecutedTool]) -> String {
    let mut parts = Vec::new();
    if let Some(message) = user_message.filter(|m| !m.is_empty()) {
        parts.push(format!("User Message:\n{}", message));
    }
    if !tools.is_empty() {
        let lines: Vec<String> = tools
            .iter()
            .map(|t| format!("- {}({})", t.name, summarize_args(&t.arguments)))
            .collect();
        parts.push(format!("Tools Executed:\n{}", lines.join("\n")));
    }
    if parts.is_empty() {
        return "No interaction to analyze.".to_string();
    }

    format!(
        "Analyze this interaction and extract relevant facts:\n\n{}\n\nExtract facts following the guidelines above.",
        parts.join("\n\n")
    )
}

/// At most three arguments; long strings keep their last 30 characters and
/// lists over three items are shown as a count.
fn summarize_args(args: &Value) -> String {
    let Some(map) = args.as_object() else {
        return String::new();
    };
    map.iter()
        .take(3)
        .map(|(key, value)| match value {
            Value::String(s) if s.chars().count() > 50 => {
                format!("{}='...{}'", key, suffix_chars(s, 30))
            }
            Value::String(s) => format!("{}='{}'", key, s),
            Value::Array(items) if items.len() > 3 => format!("{}=[{} items]", key, items.len()),
            other => format!("{}={}", key, other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
