//! User-facing output for the agent and its tools.
//!
//! Tools and the agent loop never print directly; they emit [`OutputEvent`]s
//! into an [`OutputSink`]. The CLI installs a [`TerminalSink`], tests install a
//! [`MemorySink`] and inspect what would have been shown.

use std::io::Write;
use std::sync::Mutex;

/// Something worth showing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// A tool announcing itself, e.g. `read_files(a.txt, b.txt)`
    ToolCall(String),
    /// One line of a running command's standard output
    Stdout(String),
    /// One line of a running command's standard error
    Stderr(String),
    /// Short human summary of a tool result
    ToolSummary(String),
    /// Final assistant answer for the turn
    Assistant(String),
    /// Assistant text that accompanies tool calls
    Interim(String),
    /// Informational status line
    Notice(String),
    /// Non-fatal problem
    Warning(String),
    /// Failure the user must know about
    Error(String),
}

/// Receiver of user-facing output.
pub trait OutputSink: Send + Sync {
    /// Show one event.
    fn emit(&self, event: OutputEvent);
}

/// Prints events to the terminal. Command output is indented two spaces.
#[derive(Debug, Default)]
pub struct TerminalSink;

impl TerminalSink {
    /// Create a terminal sink.
    pub fn new() -> Self {
        Self
    }
}

impl OutputSink for TerminalSink {
    fn emit(&self, event: OutputEvent) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // Write failures (closed pipe) are not worth aborting a turn for.
        let _ = match event {
            OutputEvent::ToolCall(text) => writeln!(out, "{}", text),
            OutputEvent::Stdout(line) => writeln!(out, "  {}", line),
            OutputEvent::Stderr(line) => {
                drop(out);
                writeln!(std::io::stderr(), "  {}", line)
            }
            OutputEvent::ToolSummary(text) => writeln!(out, "{}", text),
            OutputEvent::Assistant(text) => writeln!(out, "\n{}\n", text),
            OutputEvent::Interim(text) => writeln!(out, "{}", text),
            OutputEvent::Notice(text) => writeln!(out, "{}", text),
            OutputEvent::Warning(text) => {
                drop(out);
                writeln!(std::io::stderr(), "Warning: {}", text)
            }
            OutputEvent::Error(text) => {
                drop(out);
                writeln!(std::io::stderr(), "Error: {}", text)
            }
        };
    }
}

/// Records events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<OutputEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events emitted so far, in order.
    pub fn events(&self) -> Vec<OutputEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// True if any event satisfies `pred`.
    pub fn contains(&self, pred: impl Fn(&OutputEvent) -> bool) -> bool {
        self.events().iter().any(pred)
    }
}

impl OutputSink for MemorySink {
    fn emit(&self, event: OutputEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&self, _event: OutputEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.emit(OutputEvent::ToolCall("read_files(a.txt)".into()));
        sink.emit(OutputEvent::Stdout("hello".into()));

        assert_eq!(
            sink.events(),
            vec![
                OutputEvent::ToolCall("read_files(a.txt)".into()),
                OutputEvent::Stdout("hello".into()),
            ]
        );
        assert!(sink.contains(|e| matches!(e, OutputEvent::Stdout(l) if l == "hello")));
        assert!(!sink.contains(|e| matches!(e, OutputEvent::Error(_))));
    }

    #[test]
    fn null_sink_accepts_events() {
        NullSink.emit(OutputEvent::Warning("ignored".into()));
    }
}
