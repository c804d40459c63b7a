//! Shell tool for ZeptoAgent
//!
//! Runs a command through the platform shell, streaming each output line to
//! the user while capturing the full text for the LLM.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::display::OutputEvent;
use crate::error::Result;

use super::{announce, required_str, ResultFormatter, Tool, ToolContext, ToolParam};

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Executes a shell command and returns `[stdout, stderr, exit_code]`.
///
/// Never fails for a well-formed call: a command that cannot be launched
/// yields `["", "<error>", 1]`.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use zeptoagent::tools::{Tool, ToolContext};
/// use zeptoagent::tools::shell::ExecuteCommandTool;
///
/// let result = ExecuteCommandTool
///     .execute(json!({"command": "echo hello"}), &ToolContext::default())
///     .unwrap();
/// assert_eq!(result, json!(["hello\n", "", 0]));
/// ```
pub struct ExecuteCommandTool;

impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![ToolParam::new("command", "string", "Command to execute")]
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn result_formatter(&self) -> Option<ResultFormatter> {
        Some(Arc::new(format_command_result))
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let command = required_str(&args, "command")?;
        announce(ctx, self.name(), &args);

        let (stdout, stderr, code) = run_streaming(command, ctx);
        let status = if code == 0 {
            "✓".to_string()
        } else {
            format!("✗ (code: {})", code)
        };
        ctx.emit(OutputEvent::Notice(format!("  Command completed: {}", status)));

        Ok(json!([stdout, stderr, code]))
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

/// Forward complete lines (newline kept) from `reader` until EOF.
fn pump<R: Read + Send + 'static>(
    reader: R,
    stream: Stream,
    tx: mpsc::Sender<(Stream, String)>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Command output stream closed");
                    break;
                }
            }
        }
    })
}

fn run_streaming(command: &str, ctx: &ToolContext) -> (String, String, i32) {
    let mut cmd = shell_command(command);
    if let Some(workspace) = &ctx.workspace {
        cmd.current_dir(workspace);
    }
    let spawned = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            warn!(command = %command, error = %e, "Failed to execute command");
            ctx.emit(OutputEvent::Warning(format!(
                "Failed to execute command: {}: {}",
                command, e
            )));
            return (String::new(), e.to_string(), 1);
        }
    };

    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::new();
    if let Some(out) = child.stdout.take() {
        readers.push(pump(out, Stream::Stdout, tx.clone()));
    }
    if let Some(err) = child.stderr.take() {
        readers.push(pump(err, Stream::Stderr, tx.clone()));
    }
    drop(tx);

    let mut stdout = String::new();
    let mut stderr = String::new();
    // Ends once both readers hit EOF and drop their senders.
    for (stream, line) in rx {
        let shown = line.trim_end_matches(['\r', '\n']).to_string();
        match stream {
            Stream::Stdout => {
                ctx.emit(OutputEvent::Stdout(shown));
                stdout.push_str(&line);
            }
            Stream::Stderr => {
                ctx.emit(OutputEvent::Stderr(shown));
                stderr.push_str(&line);
            }
        }
    }
    for reader in readers {
        let _ = reader.join();
    }

    let code = match child.wait() {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            stderr.push_str(&e.to_string());
            1
        }
    };
    (stdout, stderr, code)
}

/// Command output for the user, or a completion line when there was none.
fn format_command_result(result: &Value) -> String {
    let (Some(stdout), Some(stderr), Some(code)) = (
        result.get(0).and_then(Value::as_str),
        result.get(1).and_then(Value::as_str),
        result.get(2).and_then(Value::as_i64),
    ) else {
        return result.to_string();
    };

    let parts: Vec<&str> = [stdout.trim_end(), stderr.trim_end()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        format!("✓ Command completed (exit code {})", code)
    } else {
        parts.join("\n")
    }
}
