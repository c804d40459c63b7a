//! Error types for ZeptoAgent
//!
//! This module defines all error types used throughout the agent.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Errors about conversation content (bad tool arguments, tool failures,
//! validation rejections) are turned into text for the LLM by the tool
//! registry and dispatcher. The variants here surface at infrastructure
//! boundaries: config loading, the LLM transport and the MCP bridge.

use thiserror::Error;

/// The primary error type for ZeptoAgent operations.
#[derive(Error, Debug)]
pub enum ZeptoError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM provider errors (API failures, malformed responses, missing API key)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool execution errors (invalid parameters, execution failures, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Tool arguments rejected before execution.
    ///
    /// Raised by confirmation handlers. The message goes back to the LLM so
    /// it can retry with corrected arguments.
    #[error("{0}")]
    ToolValidation(String),

    /// Conversation persistence errors
    #[error("Session error: {0}")]
    Session(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found (unconfigured MCP servers, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// A bounded wait expired
    #[error("Timeout: {0}")]
    Timeout(String),

    /// MCP (Model Context Protocol) errors (server communication, tool execution, etc.)
    #[error("MCP error: {0}")]
    Mcp(String),
}

/// A specialized `Result` type for ZeptoAgent operations.
pub type Result<T> = std::result::Result<T, ZeptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ZeptoError::Config("missing API key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API key");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let zepto_err: ZeptoError = io_err.into();
        assert!(matches!(zepto_err, ZeptoError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let zepto_err: ZeptoError = json_err.into();
        assert!(matches!(zepto_err, ZeptoError::Json(_)));
    }

    #[test]
    fn test_validation_error_is_bare_message() {
        let err = ZeptoError::ToolValidation("Old content not found in a.txt".into());
        assert_eq!(err.to_string(), "Old content not found in a.txt");
    }

    #[test]
    fn test_not_found_and_timeout_display() {
        let err = ZeptoError::NotFound("Server 'fs' not found in configuration".into());
        assert_eq!(
            err.to_string(),
            "Not found: Server 'fs' not found in configuration"
        );
        let err = ZeptoError::Timeout("Server 'fs' failed to start".into());
        assert_eq!(err.to_string(), "Timeout: Server 'fs' failed to start");
    }

    #[test]
    fn test_error_variants() {
        // Ensure all variants can be created
        let _ = ZeptoError::Config("test".into());
        let _ = ZeptoError::Provider("test".into());
        let _ = ZeptoError::Tool("test".into());
        let _ = ZeptoError::ToolValidation("test".into());
        let _ = ZeptoError::Session("test".into());
        let _ = ZeptoError::NotFound("test".into());
        let _ = ZeptoError::Timeout("test".into());
        let _ = ZeptoError::Mcp("test".into());
    }
}
