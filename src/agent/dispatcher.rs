//! Tool call dispatch: parse, confirm, execute, record.
//!
//! The dispatcher turns one batch of tool calls from the LLM into exactly one
//! tool-result message per call, appended in request order. Nothing in here
//! aborts the batch: bad arguments, denials and tool failures all become
//! message text the model can react to.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::display::OutputEvent;
use crate::error::ZeptoError;
use crate::session::{Message, ToolCall};
use crate::tools::{default_confirm, Prompter, ToolContext, ToolOutput, ToolRegistry};

/// Tool result recorded when the user says no.
pub const DENIED_MESSAGE: &str = "The user denied permission to execute this tool call.";

/// Tool result recorded when the arguments are not a JSON object.
pub const PARSE_ERROR_MESSAGE: &str = "Error: Could not parse tool arguments.";

/// Outcome of the confirmation step.
#[derive(Debug, PartialEq)]
enum Decision {
    Approved,
    Denied,
    /// A confirmation handler rejected the arguments
    Rejected(String),
}

/// Executes batches of tool calls against a [`ToolRegistry`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use zeptoagent::agent::ToolDispatcher;
/// use zeptoagent::session::{Message, ToolCall};
/// use zeptoagent::tools::{ScriptedPrompter, ToolContext, ToolRegistry};
///
/// let registry = Arc::new(ToolRegistry::new());
/// let mut dispatcher = ToolDispatcher::new(
///     registry,
///     Box::new(ScriptedPrompter::new(Vec::<String>::new())),
///     ToolContext::default(),
/// );
///
/// let mut messages = vec![Message::system("base")];
/// dispatcher.dispatch(&[ToolCall::new("call_1", "ghost", "{}")], &mut messages);
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[1].tool_call_id.as_deref(), Some("call_1"));
/// ```
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    prompter: Box<dyn Prompter>,
    ctx: ToolContext,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, prompter: Box<dyn Prompter>, ctx: ToolContext) -> Self {
        Self {
            registry,
            prompter,
            ctx,
        }
    }

    /// The registry calls are executed against.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run every call in order and append one tool-result message per call.
    pub fn dispatch(&mut self, calls: &[ToolCall], messages: &mut Vec<Message>) {
        for call in calls {
            let content = self.dispatch_one(call);
            messages.push(Message::tool_result(&call.id, &call.name, &content));
        }
    }

    fn dispatch_one(&mut self, call: &ToolCall) -> String {
        let Some(args) = parse_arguments(&call.arguments) else {
            warn!(tool = %call.name, id = %call.id, "Invalid JSON in tool arguments");
            return PARSE_ERROR_MESSAGE.to_string();
        };

        if self.needs_confirmation(&call.name, &args) {
            match self.confirm(&call.name, &args) {
                Decision::Approved => {}
                Decision::Denied => {
                    info!(tool = %call.name, id = %call.id, "Tool call denied");
                    return DENIED_MESSAGE.to_string();
                }
                Decision::Rejected(message) => {
                    info!(tool = %call.name, id = %call.id, "Tool arguments rejected");
                    return message;
                }
            }
        }

        info!(tool = %call.name, id = %call.id, "Executing tool");
        let output = self.registry.execute(&call.name, args, &self.ctx);
        let content = output.for_llm();
        match &output {
            ToolOutput::Success(value) => {
                if let Some(formatter) = self.registry.format_result(&call.name) {
                    self.ctx.emit(OutputEvent::ToolSummary(formatter(value)));
                }
            }
            ToolOutput::Error(message) => {
                self.ctx.emit(OutputEvent::Warning(message.clone()));
            }
        }
        content
    }

    /// Registry policy, except that `execute_command` skips confirmation when
    /// the command text contains `ls` anywhere.
    fn needs_confirmation(&self, name: &str, args: &Value) -> bool {
        if name == "execute_command"
            && args
                .get("command")
                .and_then(Value::as_str)
                .is_some_and(|command| command.contains("ls"))
        {
            debug!("Skipping confirmation for listing command");
            return false;
        }
        self.registry.requires_confirmation(name)
    }

    fn confirm(&mut self, name: &str, args: &Value) -> Decision {
        let prompter = self.prompter.as_mut();
        let result = match self.registry.confirmation_handler(name) {
            Some(handler) => handler.confirm(name, args, &self.ctx, prompter),
            None => default_confirm(name, args, prompter),
        };
        match result {
            Ok(true) => Decision::Approved,
            Ok(false) => Decision::Denied,
            Err(ZeptoError::ToolValidation(message)) => {
                Decision::Rejected(format!("Error: {}", message))
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Confirmation failed");
                Decision::Denied
            }
        }
    }
}

/// Arguments as a JSON object. Blank text counts as no arguments.
fn parse_arguments(raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return Some(json!({}));
    }
    serde_json::from_str::<Value>(raw)
        .ok()
        .filter(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemorySink;
    use crate::error::Result;
    use crate::session::Role;
    use crate::tools::{ConfirmationHandler, ScriptedPrompter, Tool, ToolParam};

    struct Counter {
        confirm: bool,
    }

    impl Tool for Counter {
        fn name(&self) -> &str {
            if self.confirm {
                "guarded"
            } else {
                "free"
            }
        }
        fn description(&self) -> &str {
            "Returns its arguments"
        }
        fn parameters(&self) -> Vec<ToolParam> {
            vec![]
        }
        fn requires_confirmation(&self) -> bool {
            self.confirm
        }
        fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
            Ok(args)
        }
    }

    struct Picky;

    impl ConfirmationHandler for Picky {
        fn confirm(
            &self,
            _name: &str,
            args: &Value,
            _ctx: &ToolContext,
            prompter: &mut dyn Prompter,
        ) -> Result<bool> {
            if args.get("ok").is_none() {
                return Err(ZeptoError::ToolValidation("missing ok".to_string()));
            }
            prompter.show("preview");
            Ok(crate::tools::is_affirmative(&prompter.ask("Sure? ")?))
        }
    }

    struct PickyTool;

    impl Tool for PickyTool {
        fn name(&self) -> &str {
            "picky"
        }
        fn description(&self) -> &str {
            "Has its own confirmation"
        }
        fn parameters(&self) -> Vec<ToolParam> {
            vec![]
        }
        fn requires_confirmation(&self) -> bool {
            true
        }
        fn confirmation_handler(&self) -> Option<Arc<dyn ConfirmationHandler>> {
            Some(Arc::new(Picky))
        }
        fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
            Ok(json!("picked"))
        }
    }

    fn dispatcher(answers: &[&str]) -> (ToolDispatcher, ScriptedPrompter, Arc<MemorySink>) {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(Counter { confirm: true }));
        registry.register(Arc::new(Counter { confirm: false }));
        registry.register(Arc::new(PickyTool));
        let prompter = ScriptedPrompter::new(answers.iter().copied());
        let sink = Arc::new(MemorySink::new());
        let dispatcher = ToolDispatcher::new(
            registry,
            Box::new(prompter.clone()),
            ToolContext::new(sink.clone()),
        );
        (dispatcher, prompter, sink)
    }

    fn run(dispatcher: &mut ToolDispatcher, call: ToolCall) -> String {
        let mut messages = Vec::new();
        dispatcher.dispatch(&[call], &mut messages);
        messages.remove(0).content
    }

    #[test]
    fn test_parse_failures_are_per_call() {
        let (mut d, prompter, _) = dispatcher(&[]);
        let mut messages = vec![Message::system("s")];
        d.dispatch(
            &[
                ToolCall::new("a", "free", "{not json"),
                ToolCall::new("b", "free", "[1, 2]"),
                ToolCall::new("c", "free", r#"{"x": 1}"#),
            ],
            &mut messages,
        );
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, PARSE_ERROR_MESSAGE);
        assert_eq!(messages[2].content, PARSE_ERROR_MESSAGE);
        assert_eq!(messages[3].content, r#"{"x":1}"#);
        assert!(messages[1..].iter().all(|m| m.role == Role::Tool));
        assert!(prompter.prompts().is_empty());
    }

    #[test]
    fn test_empty_arguments_are_an_empty_object() {
        let (mut d, _, _) = dispatcher(&[]);
        assert_eq!(run(&mut d, ToolCall::new("a", "free", "")), "{}");
    }

    #[test]
    fn test_default_confirmation() {
        let (mut d, prompter, _) = dispatcher(&["", "n"]);
        assert_eq!(run(&mut d, ToolCall::new("a", "guarded", r#"{"v": 1}"#)), r#"{"v":1}"#);
        assert_eq!(run(&mut d, ToolCall::new("b", "guarded", r#"{"v": 2}"#)), DENIED_MESSAGE);
        assert_eq!(
            prompter.prompts(),
            vec!["Confirm guarded(v=1)? [Y/n] ", "Confirm guarded(v=2)? [Y/n] "]
        );
    }

    #[test]
    fn test_custom_handler_and_validation() {
        let (mut d, prompter, _) = dispatcher(&["yes"]);
        assert_eq!(run(&mut d, ToolCall::new("a", "picky", "{}")), "Error: missing ok");
        assert!(prompter.prompts().is_empty());

        assert_eq!(run(&mut d, ToolCall::new("b", "picky", r#"{"ok": true}"#)), "picked");
        assert_eq!(prompter.shown(), vec!["preview"]);
        assert_eq!(prompter.prompts(), vec!["Sure? "]);
    }

    #[test]
    fn test_prompter_failure_denies() {
        let (mut d, _, _) = dispatcher(&[]);
        assert_eq!(run(&mut d, ToolCall::new("a", "guarded", "{}")), DENIED_MESSAGE);
    }

    #[test]
    fn test_unknown_tool_asks_then_reports() {
        let (mut d, prompter, sink) = dispatcher(&["y"]);
        let content = run(&mut d, ToolCall::new("a", "ghost", "{}"));
        assert_eq!(content, "Error: Tool 'ghost' not found");
        assert_eq!(prompter.prompts().len(), 1);
        assert!(sink.contains(|e| matches!(e, OutputEvent::Warning(m) if m.contains("ghost"))));
    }

    #[test]
    fn test_ls_substring_skips_confirmation() {
        let (d, _, _) = dispatcher(&[]);
        for command in ["ls -la", "echo \"lsleep\"", "rm -rf build #ls", "make test"] {
            let expected = !command.contains("ls");
            assert_eq!(
                d.needs_confirmation("execute_command", &json!({ "command": command })),
                expected,
                "{}",
                command
            );
        }
        assert!(d.needs_confirmation("execute_command", &json!({})));
        assert!(d.needs_confirmation("guarded", &json!({"command": "ls"})));
    }
}
