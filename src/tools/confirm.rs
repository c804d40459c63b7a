//! User confirmation for side-effecting tool calls.
//!
//! The dispatcher asks a [`Prompter`] before running a tool that requires
//! confirmation. Tools may supply their own [`ConfirmationHandler`] to show a
//! preview (see [`super::diff`]) before asking.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{Result, ZeptoError};
use crate::utils::string::format_tool_args;

use super::types::ToolContext;

/// Interactive input used by confirmation flows.
pub trait Prompter: Send {
    /// Render a block of text (a diff preview) before asking.
    fn show(&mut self, text: &str);

    /// Print `prompt` and read one line of input, without the newline.
    fn ask(&mut self, prompt: &str) -> Result<String>;
}

/// Reads answers from standard input.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn show(&mut self, text: &str) {
        println!("{}", text);
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        print!("{}", prompt);
        std::io::stdout().flush()?;

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            // A closed stdin must not approve anything.
            return Ok("n".to_string());
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Replays canned answers and records what was shown. For tests.
///
/// Clones share state, so a test can hand one clone to the dispatcher and
/// inspect the prompts through another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    answers: VecDeque<String>,
    prompts: Vec<String>,
    shown: Vec<String>,
}

impl ScriptedPrompter {
    /// Prompter answering with `answers` in order.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = ScriptState {
            answers: answers.into_iter().map(Into::into).collect(),
            ..ScriptState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Prompts asked so far.
    pub fn prompts(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.prompts.clone())
            .unwrap_or_default()
    }

    /// Previews shown so far.
    pub fn shown(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.shown.clone())
            .unwrap_or_default()
    }
}

impl Prompter for ScriptedPrompter {
    fn show(&mut self, text: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.shown.push(text.to_string());
        }
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ZeptoError::Tool("Prompter state poisoned".to_string()))?;
        state.prompts.push(prompt.to_string());
        state
            .answers
            .pop_front()
            .ok_or_else(|| ZeptoError::Tool("No scripted answer left".to_string()))
    }
}

/// Custom confirmation flow for a tool.
pub trait ConfirmationHandler: Send + Sync {
    /// Decide whether the call may run.
    ///
    /// Returning [`ZeptoError::ToolValidation`] rejects the arguments without
    /// asking; the message is sent back to the LLM. Paths in `args` resolve
    /// through `ctx` the same way the tool resolves them.
    fn confirm(
        &self,
        tool_name: &str,
        args: &Value,
        ctx: &ToolContext,
        prompter: &mut dyn Prompter,
    ) -> Result<bool>;
}

/// True for an empty answer, `y` or `yes` (any case).
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    answer.is_empty() || answer == "y" || answer == "yes"
}

/// The default `Confirm name(args)? [Y/n] ` question.
pub fn default_confirm(tool_name: &str, args: &Value, prompter: &mut dyn Prompter) -> Result<bool> {
    let prompt = format!("Confirm {}({})? [Y/n] ", tool_name, format_tool_args(args));
    let answer = prompter.ask(&prompt)?;
    Ok(is_affirmative(&answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_affirmative_answers() {
        for answer in ["", "  ", "y", "Y", "yes", "YES", " Yes "] {
            assert!(is_affirmative(answer), "{:?} should confirm", answer);
        }
        for answer in ["n", "no", "nope", "yess", "q"] {
            assert!(!is_affirmative(answer), "{:?} should deny", answer);
        }
    }

    #[test]
    fn test_default_confirm_prompt_text() {
        let mut prompter = ScriptedPrompter::new([""]);
        let approved =
            default_confirm("execute_command", &json!({"command": "make"}), &mut prompter).unwrap();
        assert!(approved);
        assert_eq!(
            prompter.prompts(),
            vec!["Confirm execute_command(command='make')? [Y/n] "]
        );
    }

    #[test]
    fn test_default_confirm_denied() {
        let mut prompter = ScriptedPrompter::new(["n"]);
        assert!(!default_confirm("write_file", &json!({}), &mut prompter).unwrap());
    }

    #[test]
    fn test_scripted_prompter_runs_out() {
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        assert!(prompter.ask("anything? ").is_err());
        prompter.show("preview");
        assert_eq!(prompter.shown(), vec!["preview"]);
    }

    #[test]
    fn test_scripted_prompter_clones_share_state() {
        let prompter = ScriptedPrompter::new(["y"]);
        let mut handle = prompter.clone();
        assert!(default_confirm("patch_file", &json!({}), &mut handle).unwrap());
        assert_eq!(prompter.prompts().len(), 1);
    }
}
