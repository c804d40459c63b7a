//! MCP client over newline-delimited JSON-RPC.
//!
//! [`McpClient`] speaks the protocol over any async byte stream pair.
//! [`StdioConnector`] launches a server process and wraps its stdio in a
//! client, producing an [`McpSession`] for the bridge.

use std::fs::File;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

use crate::config::McpServerConfig;
use crate::error::{Result, ZeptoError};

use super::protocol::{
    JsonRpcMessage, JsonRpcRequest, ListToolsResult, McpTool, CLIENT_NAME, PROTOCOL_VERSION,
};

/// A live connection to one MCP server.
#[async_trait]
pub trait McpSession: Send {
    async fn list_tools(&mut self) -> Result<Vec<McpTool>>;

    /// Call a tool; returns `result.content`, or the whole result without it.
    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions. Server stderr goes to `log`.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        name: &str,
        config: &McpServerConfig,
        log: File,
    ) -> Result<Box<dyn McpSession>>;
}

/// JSON-RPC client over a reader/writer pair.
pub struct McpClient<R, W> {
    server: String,
    reader: BufReader<R>,
    writer: W,
    next_id: u64,
}

impl<R, W> McpClient<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(server: &str, reader: R, writer: W) -> Self {
        Self {
            server: server.to_string(),
            reader: BufReader::new(reader),
            writer,
            next_id: 1,
        }
    }

    /// Run the `initialize` handshake and send `notifications/initialized`.
    pub async fn initialize(&mut self) -> Result<Value> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": CLIENT_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;
        self.notify("notifications/initialized", json!({})).await?;
        debug!(server = %self.server, "MCP handshake complete");
        Ok(result)
    }

    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        let result = self.request("tools/list", json!({})).await?;
        let parsed: ListToolsResult = serde_json::from_value(result)?;
        Ok(parsed.tools)
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value> {
        // Servers reject a null arguments field.
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        let mut result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        Ok(match result.get_mut("content") {
            Some(content) => content.take(),
            None => result,
        })
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&JsonRpcRequest::new(id, method, params)).await?;
        self.read_response(id).await
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<()> {
        self.send(&JsonRpcRequest::notification(method, params))
            .await
    }

    async fn send(&mut self, message: &JsonRpcRequest) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self, id: u64) -> Result<Value> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.reader.read_line(&mut line).await?;
            if read == 0 {
                return Err(ZeptoError::Mcp(format!(
                    "Server '{}' closed the connection",
                    self.server
                )));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let message: JsonRpcMessage = match serde_json::from_str(trimmed) {
                Ok(m) => m,
                Err(e) => {
                    debug!(server = %self.server, error = %e, "Skipping non-JSON line");
                    continue;
                }
            };
            if !message.is_response_to(id) {
                debug!(server = %self.server, method = ?message.method, "Skipping unrelated message");
                continue;
            }
            if let Some(error) = message.error {
                return Err(ZeptoError::Mcp(format!(
                    "Server '{}' returned an error: {}",
                    self.server, error
                )));
            }
            return Ok(message.result.unwrap_or(Value::Null));
        }
    }
}

/// A server process plus the client on its stdio.
pub struct StdioSession {
    client: McpClient<ChildStdout, ChildStdin>,
    child: Child,
}

#[async_trait]
impl McpSession for StdioSession {
    async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        self.client.list_tools().await
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value> {
        self.client.call_tool(name, arguments).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_none() {
            self.child.kill().await?;
        }
        Ok(())
    }
}

/// Launches servers as child processes speaking MCP over stdio.
#[derive(Debug, Default)]
pub struct StdioConnector;

#[async_trait]
impl SessionConnector for StdioConnector {
    async fn connect(
        &self,
        name: &str,
        config: &McpServerConfig,
        log: File,
    ) -> Result<Box<dyn McpSession>> {
        info!(server = %name, command = %config.command, "Spawning MCP server");

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ZeptoError::Mcp(format!(
                    "Failed to spawn server '{}' ({}): {}",
                    name, config.command, e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ZeptoError::Mcp(format!("Server '{}' has no stdin", name)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ZeptoError::Mcp(format!("Server '{}' has no stdout", name)))?;

        let mut client = McpClient::new(name, stdout, stdin);
        client.initialize().await?;
        Ok(Box::new(StdioSession { client, child }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split, DuplexStream, ReadHalf, WriteHalf};

    type TestClient = McpClient<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    /// A client wired to a scripted server that answers each request with
    /// the next entry of `replies` (lines written verbatim, `{id}` filled in).
    fn scripted(replies: Vec<Vec<&'static str>>) -> (TestClient, tokio::task::JoinHandle<Vec<Value>>) {
        let (client_end, server_end) = duplex(64 * 1024);
        let (client_read, client_write) = split(client_end);
        let (server_read, mut server_write) = split(server_end);

        let server = tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            let mut received = Vec::new();
            let mut replies = replies.into_iter();
            while let Ok(Some(line)) = lines.next_line().await {
                let message: Value = serde_json::from_str(&line).unwrap();
                let id = message.get("id").cloned();
                received.push(message);
                let Some(id) = id else { continue };
                let Some(batch) = replies.next() else { break };
                for reply in batch {
                    let text = reply.replace("{id}", &id.to_string());
                    server_write.write_all(text.as_bytes()).await.unwrap();
                    server_write.write_all(b"\n").await.unwrap();
                }
            }
            received
        });

        (McpClient::new("test", client_read, client_write), server)
    }

    #[tokio::test]
    async fn test_initialize_then_list_tools() {
        let (mut client, server) = scripted(vec![
            vec![r#"{"jsonrpc":"2.0","id":{id},"result":{"protocolVersion":"2024-11-05"}}"#],
            vec![
                r#"{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}"#,
                r#"{"jsonrpc":"2.0","id":{id},"result":{"tools":[{"name":"now","description":"Current time","inputSchema":{"type":"object"}}]}}"#,
            ],
        ]);

        client.initialize().await.unwrap();
        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "now");
        assert_eq!(tools[0].description, "Current time");

        drop(client);
        let received = server.await.unwrap();
        assert_eq!(received[0]["method"], "initialize");
        assert_eq!(received[0]["params"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(received[1]["method"], "notifications/initialized");
        assert!(received[1].get("id").is_none());
        assert_eq!(received[2]["method"], "tools/list");
    }

    #[tokio::test]
    async fn test_call_tool_returns_content() {
        let (mut client, server) = scripted(vec![vec![
            r#"{"jsonrpc":"2.0","id":{id},"result":{"content":[{"type":"text","text":"42"}]}}"#,
        ]]);

        let content = client.call_tool("answer", Value::Null).await.unwrap();
        assert_eq!(content, json!([{"type": "text", "text": "42"}]));

        drop(client);
        let received = server.await.unwrap();
        assert_eq!(received[0]["params"], json!({"name": "answer", "arguments": {}}));
    }

    #[tokio::test]
    async fn test_call_tool_without_content_returns_result() {
        let (mut client, _server) = scripted(vec![vec![
            r#"{"jsonrpc":"2.0","id":{id},"result":{"value":1}}"#,
        ]]);
        let result = client.call_tool("raw", json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"value": 1}));
    }

    #[tokio::test]
    async fn test_error_response() {
        let (mut client, _server) = scripted(vec![vec![
            "not json at all",
            r#"{"jsonrpc":"2.0","id":{id},"error":{"code":-32601,"message":"Method not found"}}"#,
        ]]);
        let err = client.call_tool("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, ZeptoError::Mcp(ref m) if m.contains("Method not found")));
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let (mut client, _server) = scripted(vec![]);
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, ZeptoError::Mcp(ref m) if m.contains("closed the connection")));
    }
}
