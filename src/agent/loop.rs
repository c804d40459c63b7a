//! Agent loop implementation
//!
//! This module provides the turn loop: it sends the conversation to the LLM,
//! dispatches the tool calls it asks for and stops at a final answer, an LLM
//! failure or the iteration cap. Finished turns are mined for context on a
//! background thread.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, error, info, warn};

use crate::display::{OutputEvent, OutputSink};
use crate::memory::ContextExtractor;
use crate::providers::{ChatOptions, LLMProvider};
use crate::session::{Message, MessageStorage};

use super::context::ContextBuilder;
use super::dispatcher::ToolDispatcher;

/// Default cap on LLM round trips per turn.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Warning shown when a turn runs out of iterations.
pub const MAX_ITERATIONS_WARNING: &str = "Maximum iterations reached";

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model gave a final answer
    Answered(String),
    /// The LLM call failed; carries the error text
    Aborted(String),
    /// The model kept asking for tools until the cap
    MaxIterations,
}

/// The main agent loop.
///
/// Owns the conversation. The first message is always the system message,
/// rebuilt at the start of every turn.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use zeptoagent::agent::{AgentLoop, ToolDispatcher};
/// use zeptoagent::display::TerminalSink;
///
/// let sink = Arc::new(TerminalSink::new());
/// let mut agent = AgentLoop::new(provider, dispatcher, sink)
///     .with_storage(MessageStorage::default());
/// agent.process_turn("What does src/main.rs do?");
/// ```
pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    dispatcher: ToolDispatcher,
    context_builder: ContextBuilder,
    storage: Option<MessageStorage>,
    extractor: Option<Arc<ContextExtractor>>,
    max_iterations: usize,
    sink: Arc<dyn OutputSink>,
    messages: Vec<Message>,
    background: Vec<JoinHandle<()>>,
}

impl AgentLoop {
    /// Create a loop with the default context builder and no persistence.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        dispatcher: ToolDispatcher,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        let context_builder = ContextBuilder::new();
        let messages = vec![context_builder.build_system_message()];
        Self {
            provider,
            dispatcher,
            context_builder,
            storage: None,
            extractor: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            sink,
            messages,
            background: Vec::new(),
        }
    }

    /// Use a custom context builder.
    pub fn with_context_builder(mut self, context_builder: ContextBuilder) -> Self {
        self.messages[0] = context_builder.build_system_message();
        self.context_builder = context_builder;
        self
    }

    /// Load history from `storage` and save to it after every turn.
    pub fn with_storage(mut self, storage: MessageStorage) -> Self {
        let history = storage.load();
        info!(messages = history.len(), "Loaded conversation history");
        self.messages.truncate(1);
        self.messages.extend(history);
        self.storage = Some(storage);
        self
    }

    /// Extract context from every finished turn.
    pub fn with_extractor(mut self, extractor: Arc<ContextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// The conversation, system message first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Forget the conversation and erase stored history.
    pub fn clear_history(&mut self) -> crate::error::Result<()> {
        self.messages.truncate(1);
        if let Some(storage) = &self.storage {
            storage.clear()?;
        }
        Ok(())
    }

    /// Run one turn for `input`.
    ///
    /// LLM failures and the iteration cap are reported to the sink and end
    /// the turn; they are not errors for the caller.
    pub fn process_turn(&mut self, input: &str) -> TurnOutcome {
        self.messages[0] = self.context_builder.build_system_message();
        self.messages.push(Message::user(input));

        let outcome = self.run_iterations();

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save(&self.messages) {
                warn!(error = %e, "Failed to save conversation history");
            }
        }
        if !matches!(outcome, TurnOutcome::Aborted(_)) {
            self.spawn_extraction();
        }
        outcome
    }

    fn run_iterations(&mut self) -> TurnOutcome {
        let options = ChatOptions::new();
        let mut iteration = 0;
        while iteration < self.max_iterations {
            let definitions = self.dispatcher.registry().definitions();
            let response = match self.provider.chat(&self.messages, &definitions, &options) {
                Ok(response) => response,
                Err(e) => {
                    error!(provider = self.provider.name(), error = %e, "LLM request failed");
                    self.sink
                        .emit(OutputEvent::Error(format!("Failed to get a response: {}", e)));
                    return TurnOutcome::Aborted(e.to_string());
                }
            };

            if !response.has_tool_calls() {
                self.sink.emit(OutputEvent::Assistant(response.content.clone()));
                self.messages.push(Message::assistant(&response.content));
                return TurnOutcome::Answered(response.content);
            }

            iteration += 1;
            debug!("Tool iteration {} of {}", iteration, self.max_iterations);
            if !response.content.trim().is_empty() {
                self.sink.emit(OutputEvent::Interim(response.content.clone()));
            }
            let calls = response.session_tool_calls();
            self.messages
                .push(Message::assistant_with_tools(&response.content, calls.clone()));
            self.dispatcher.dispatch(&calls, &mut self.messages);
        }

        crate::log_component!(
            warn,
            "agent",
            "Tool loop reached maximum iterations",
            iterations = iteration as u64
        );
        self.sink
            .emit(OutputEvent::Warning(MAX_ITERATIONS_WARNING.to_string()));
        TurnOutcome::MaxIterations
    }

    /// Mine a snapshot of the conversation on its own thread.
    fn spawn_extraction(&mut self) {
        let Some(extractor) = self.extractor.clone() else {
            return;
        };
        self.background.retain(|handle| !handle.is_finished());

        let snapshot = self.messages.clone();
        let spawned = std::thread::Builder::new()
            .name("context-extraction".to_string())
            .spawn(move || {
                match catch_unwind(AssertUnwindSafe(|| extractor.extract_from_messages(&snapshot))) {
                    Ok(Ok(facts)) => debug!(facts = facts.len(), "Context extraction finished"),
                    Ok(Err(e)) => warn!(error = %e, "Context extraction failed"),
                    Err(_) => warn!("Context extraction panicked"),
                }
            });
        match spawned {
            Ok(handle) => self.background.push(handle),
            Err(e) => warn!(error = %e, "Could not start context extraction"),
        }
    }

    /// Block until pending context extractions are done.
    pub fn wait_for_background(&mut self) {
        for handle in self.background.drain(..) {
            if handle.join().is_err() {
                warn!("Context extraction thread panicked");
            }
        }
    }
}
