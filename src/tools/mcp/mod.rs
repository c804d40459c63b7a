//! MCP (Model Context Protocol) tool servers.
//!
//! Servers are child processes speaking JSON-RPC over stdio. The
//! [`McpServerManager`] runs them on a background thread; the
//! [`McpToolAdapter`] registers their tools into the [`super::ToolRegistry`].

pub mod client;
pub mod manager;
pub mod protocol;
pub mod wrapper;

pub use client::{McpClient, McpSession, SessionConnector, StdioConnector};
pub use manager::{McpServerManager, McpServerManagerOptions, SessionState};
pub use protocol::McpTool;
pub use wrapper::{convert_schema, McpToolAdapter, McpToolWrapper};
