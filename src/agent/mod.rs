//! Agent module - Core AI agent logic and conversation handling
//!
//! This module provides the turn loop, tool call dispatch and system prompt
//! assembly for ZeptoAgent. The agent is responsible for:
//!
//! - Building the system prompt from base instructions and stored context
//! - Calling the LLM provider with the conversation and tool schemas
//! - Confirming and executing tool calls, feeding results back to the LLM
//! - Persisting the conversation and mining it for context
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │     CLI     │────>│  AgentLoop  │────>│ LLMProvider │
//! │   (REPL)    │     │             │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │    Tool     │────>│    Tools    │
//!                     │ Dispatcher  │     │  Registry   │
//!                     └─────────────┘     └─────────────┘
//! ```

mod context;
mod dispatcher;
mod r#loop;

pub use context::{load_context_files, ContextBuilder, DEFAULT_SYSTEM_PROMPT};
pub use dispatcher::{ToolDispatcher, DENIED_MESSAGE, PARSE_ERROR_MESSAGE};
pub use r#loop::{AgentLoop, TurnOutcome, DEFAULT_MAX_ITERATIONS, MAX_ITERATIONS_WARNING};
