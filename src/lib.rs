//! ZeptoAgent - a terminal coding agent with confirmed tool use
//!
//! The agent sends the conversation to an LLM, runs the tools it asks for
//! (after asking the user when a tool has side effects) and feeds the results
//! back until the model answers. Tools come from the built-in set and from
//! MCP servers bridged in on a background thread.

pub mod agent;
pub mod config;
pub mod display;
pub mod error;
pub mod memory;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{AgentLoop, ContextBuilder, ToolDispatcher, TurnOutcome};
pub use config::Config;
pub use error::{Result, ZeptoError};
pub use providers::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};
pub use session::{Message, MessageStorage, Role, ToolCall};
pub use tools::{Tool, ToolRegistry};
