//! Providers module - LLM backends
//!
//! This module defines the `LLMProvider` trait and the types exchanged with
//! it. [`OpenAIProvider`] speaks the OpenAI-compatible chat completions
//! protocol; tests substitute scripted providers.
//!
//! # Example
//!
//! ```rust,ignore
//! use zeptoagent::providers::{ChatOptions, LLMProvider, OpenAIProvider};
//! use zeptoagent::session::Message;
//!
//! let provider = OpenAIProvider::from_config(&config.llm)?;
//! let response = provider.chat(&[Message::user("Hello!")], &[], &ChatOptions::new())?;
//! println!("Response: {}", response.content);
//! ```

pub mod openai;
mod types;

pub use openai::OpenAIProvider;
pub use types::{
    ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolChoice, ToolDefinition, Usage,
};
