//! OpenAI-compatible Chat Completions provider
//!
//! Talks to any endpoint that implements `POST <api_base>/chat/completions`
//! with bearer authentication. Requests are blocking and sent once.
//!
//! # Example
//!
//! ```rust,ignore
//! use zeptoagent::providers::{ChatOptions, LLMProvider, OpenAIProvider};
//! use zeptoagent::session::Message;
//!
//! let provider = OpenAIProvider::new("your-api-key", "https://api.anthropic.com/v1", "claude-3-haiku-20240307")?;
//! let messages = vec![Message::system("You are helpful."), Message::user("Hello!")];
//! let response = provider.chat(&messages, &[], &ChatOptions::default())?;
//! println!("{}", response.content);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::error::{Result, ZeptoError};
use crate::session::{Message, Role};

use super::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolChoice, ToolDefinition, Usage};

// ============================================================================
// Request Types
// ============================================================================

/// Chat completions request body.
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    /// Model identifier
    model: String,
    /// Conversation messages (including system)
    messages: Vec<OpenAIMessage>,
    /// Available tools
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    /// Tool selection policy
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    /// Temperature for sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// A message in the wire format.
#[derive(Debug, Serialize)]
struct OpenAIMessage {
    /// Role: "system", "user", "assistant", or "tool"
    role: String,
    /// Message content (null for assistant messages that only call tools)
    content: Option<String>,
    /// Tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest>>,
    /// ID of the tool call this message is responding to
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    /// Tool name on tool results
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// A tool call in a request (assistant requesting tool execution).
#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest {
    id: String,
    r#type: String,
    function: OpenAIFunctionCall,
}

/// Function call details.
#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    arguments: String,
}

/// Tool definition.
#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: String,
    function: OpenAIFunctionDef,
}

/// Function definition.
#[derive(Debug, Serialize)]
struct OpenAIFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    /// Text content (may be null if tool_calls present)
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallResponse {
    id: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
}

// ============================================================================
// Provider
// ============================================================================

/// Blocking provider for OpenAI-compatible chat completion endpoints.
pub struct OpenAIProvider {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    tokens_sent: AtomicU64,
    tokens_received: AtomicU64,
}

impl OpenAIProvider {
    /// Create a provider for `model` at `api_base` (trailing slash removed).
    pub fn new(api_key: &str, api_base: &str, model: &str) -> Result<Self> {
        Self::with_timeout(api_key, api_base, model, Duration::from_secs(120))
    }

    fn with_timeout(api_key: &str, api_base: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            max_tokens: None,
            temperature: None,
            tokens_sent: AtomicU64::new(0),
            tokens_received: AtomicU64::new(0),
        })
    }

    /// Build a provider from the `llm` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ZeptoError::Config`] when no API key is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ZeptoError::Config(
                    "No API key configured. Set ANTHROPIC_API_KEY or llm.api_key in ~/.zeptoagent/config.json"
                        .to_string(),
                )
            })?;
        let mut provider = Self::with_timeout(
            api_key,
            &config.api_base,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )?;
        provider.max_tokens = config.max_tokens;
        provider.temperature = config.temperature;
        Ok(provider)
    }

    /// Model sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Prompt tokens reported by the backend so far.
    pub fn tokens_sent(&self) -> u64 {
        self.tokens_sent.load(Ordering::Relaxed)
    }

    /// Completion tokens reported by the backend so far.
    pub fn tokens_received(&self) -> u64 {
        self.tokens_received.load(Ordering::Relaxed)
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: convert_messages(messages),
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            tool_choice: options.tool_choice.as_ref().map(convert_tool_choice),
            max_tokens: options.max_tokens.or(self.max_tokens),
            temperature: options.temperature.or(self.temperature),
        }
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert ZeptoAgent messages to the wire format.
fn convert_messages(messages: &[Message]) -> Vec<OpenAIMessage> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            }
            .to_string();

            let tool_calls = msg.tool_calls.as_ref().filter(|tcs| !tcs.is_empty()).map(|tcs| {
                tcs.iter()
                    .map(|tc| OpenAIToolCallRequest {
                        id: tc.id.clone(),
                        r#type: "function".to_string(),
                        function: OpenAIFunctionCall {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect()
            });

            OpenAIMessage {
                role,
                content: if msg.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(msg.content.clone())
                },
                tool_calls,
                tool_call_id: msg.tool_call_id.clone(),
                name: msg.name.clone(),
            }
        })
        .collect()
}

/// Convert tool definitions to the wire format.
fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAITool> {
    tools
        .iter()
        .map(|t| OpenAITool {
            r#type: "function".to_string(),
            function: OpenAIFunctionDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

fn convert_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Function(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

/// Convert a wire response into an `LLMResponse`, reading `choices[0].message`.
fn convert_response(response: OpenAIResponse) -> LLMResponse {
    let choice = response.choices.into_iter().next();

    let (content, tool_calls) = match choice {
        Some(c) => {
            let content = c.message.content.unwrap_or_default();
            let tool_calls = c
                .message
                .tool_calls
                .map(|tcs| {
                    tcs.into_iter()
                        .map(|tc| {
                            LLMToolCall::new(&tc.id, &tc.function.name, &tc.function.arguments)
                        })
                        .collect()
                })
                .unwrap_or_default();
            (content, tool_calls)
        }
        None => (String::new(), Vec::new()),
    };

    let mut llm_response = if tool_calls.is_empty() {
        LLMResponse::text(&content)
    } else {
        LLMResponse::with_tools(&content, tool_calls)
    };

    if let Some(usage) = response.usage {
        llm_response =
            llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
    }

    llm_response
}

/// Turn a non-success body into a readable provider error.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<OpenAIErrorResponse>(body) {
        Ok(parsed) => match parsed.error.r#type {
            Some(kind) => format!("API error ({}): {} - {}", status, kind, parsed.error.message),
            None => format!("API error ({}): {}", status, parsed.error.message),
        },
        Err(_) => format!("API error ({}): {}", status, body),
    }
}

// ============================================================================
// LLMProvider Implementation
// ============================================================================

impl LLMProvider for OpenAIProvider {
    fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<LLMResponse> {
        let request = self.build_request(messages, tools, options);
        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| ZeptoError::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ZeptoError::Provider(error_message(status, &body)));
        }

        let parsed: OpenAIResponse = response
            .json()
            .map_err(|e| ZeptoError::Provider(format!("Failed to parse response: {}", e)))?;
        let llm_response = convert_response(parsed);

        if let Some(usage) = &llm_response.usage {
            self.tokens_sent
                .fetch_add(u64::from(usage.prompt_tokens), Ordering::Relaxed);
            self.tokens_received
                .fetch_add(u64::from(usage.completion_tokens), Ordering::Relaxed);
        }
        info!(
            tool_calls = llm_response.tool_calls.len(),
            "Chat response received"
        );
        Ok(llm_response)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
