//! MCP server manager.
//!
//! The manager owns a dedicated OS thread running a current-thread tokio
//! runtime. Synchronous callers send typed commands over a channel and block
//! on a reply channel. Every running server is its own task, so requests to
//! one server are serialized while different servers proceed independently.
//! All session state lives on the bridge thread.

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Config, McpServerConfig};
use crate::error::{Result, ZeptoError};

use super::client::{McpSession, SessionConnector, StdioConnector};
use super::protocol::McpTool;

/// How long `shutdown_all` waits for the bridge to acknowledge.
const SHUTDOWN_REPLY_TIMEOUT: Duration = Duration::from_secs(3);
/// How long `shutdown_all` waits for the bridge thread to exit.
const THREAD_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of one server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// Tuning knobs for the bridge.
#[derive(Debug, Clone)]
pub struct McpServerManagerOptions {
    /// Directory for `mcp-<server>.log` files
    pub state_dir: PathBuf,
    /// Readiness checks before a start times out
    pub startup_polls: u32,
    /// Delay between readiness checks
    pub poll_interval: Duration,
    /// Wait for server tasks on shutdown before aborting them
    pub shutdown_timeout: Duration,
}

impl Default for McpServerManagerOptions {
    fn default() -> Self {
        Self {
            state_dir: Config::dir(),
            startup_polls: 50,
            poll_interval: Duration::from_millis(100),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

type Reply<T> = SyncSender<Result<T>>;

enum Command {
    Start {
        name: String,
        reply: Reply<()>,
    },
    ListTools {
        name: String,
        reply: Reply<Vec<McpTool>>,
    },
    CallTool {
        name: String,
        tool: String,
        arguments: Value,
        reply: Reply<Value>,
    },
    /// Sent by a start poller whose server never became ready.
    StartFailed { name: String, generation: u64 },
    Shutdown { reply: SyncSender<()> },
}

enum ServerRequest {
    ListTools {
        reply: Reply<Vec<McpTool>>,
    },
    CallTool {
        tool: String,
        arguments: Value,
        reply: Reply<Value>,
    },
}

impl ServerRequest {
    fn fail(self, err: ZeptoError) {
        match self {
            ServerRequest::ListTools { reply } => {
                let _ = reply.send(Err(err));
            }
            ServerRequest::CallTool { reply, .. } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

fn not_running(name: &str) -> ZeptoError {
    ZeptoError::Mcp(format!("Server '{}' is not running", name))
}

/// Synchronous handle to the MCP bridge thread.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeMap;
/// use zeptoagent::error::ZeptoError;
/// use zeptoagent::tools::mcp::McpServerManager;
///
/// let manager = McpServerManager::new(BTreeMap::new()).unwrap();
/// let err = manager.start_server("missing").unwrap_err();
/// assert!(matches!(err, ZeptoError::NotFound(_)));
/// manager.shutdown_all().unwrap();
/// ```
pub struct McpServerManager {
    commands: mpsc::UnboundedSender<Command>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    server_names: Vec<String>,
}

impl McpServerManager {
    /// Manager launching configured servers as child processes.
    pub fn new(configs: BTreeMap<String, McpServerConfig>) -> Result<Self> {
        Self::with_connector(
            configs,
            Arc::new(StdioConnector),
            McpServerManagerOptions::default(),
        )
    }

    /// Manager with a custom session connector and options.
    pub fn with_connector(
        configs: BTreeMap<String, McpServerConfig>,
        connector: Arc<dyn SessionConnector>,
        options: McpServerManagerOptions,
    ) -> Result<Self> {
        let server_names = configs.keys().cloned().collect();
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Bridge {
            configs,
            connector,
            options,
            servers: HashMap::new(),
            next_generation: 0,
            commands: tx.clone(),
        };
        let handle = thread::Builder::new()
            .name("mcp-bridge".to_string())
            .spawn(move || run_bridge(bridge, rx))?;

        Ok(Self {
            commands: tx,
            thread: Mutex::new(Some(handle)),
            server_names,
        })
    }

    /// Names of all configured servers.
    pub fn server_names(&self) -> &[String] {
        &self.server_names
    }

    /// Whether the bridge thread is alive.
    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Start a configured server and wait until it is ready.
    ///
    /// Returns immediately when it is already running. Fails with
    /// [`ZeptoError::NotFound`] for an unconfigured name and
    /// [`ZeptoError::Timeout`] when the server does not become ready in time.
    pub fn start_server(&self, name: &str) -> Result<()> {
        self.submit(|reply| Command::Start {
            name: name.to_string(),
            reply,
        })
    }

    /// Tools advertised by a running server.
    pub fn list_tools(&self, name: &str) -> Result<Vec<McpTool>> {
        self.submit(|reply| Command::ListTools {
            name: name.to_string(),
            reply,
        })
    }

    /// Call a tool on a running server.
    pub fn call_tool(&self, name: &str, tool: &str, arguments: Value) -> Result<Value> {
        self.submit(|reply| Command::CallTool {
            name: name.to_string(),
            tool: tool.to_string(),
            arguments,
            reply,
        })
    }

    fn submit<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = sync_channel(1);
        self.commands
            .send(make(tx))
            .map_err(|_| ZeptoError::Mcp("MCP bridge is not running".to_string()))?;
        rx.recv()
            .map_err(|_| ZeptoError::Mcp("MCP bridge stopped before replying".to_string()))?
    }

    /// Stop every server and the bridge thread.
    ///
    /// Safe to call when nothing was started, and more than once.
    pub fn shutdown_all(&self) -> Result<()> {
        let Some(handle) = self
            .thread
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        else {
            return Ok(());
        };

        let (tx, rx) = sync_channel(1);
        if self.commands.send(Command::Shutdown { reply: tx }).is_ok() {
            match rx.recv_timeout(SHUTDOWN_REPLY_TIMEOUT) {
                Ok(()) => debug!("MCP bridge acknowledged shutdown"),
                Err(RecvTimeoutError::Timeout) => warn!("MCP bridge did not acknowledge shutdown"),
                Err(RecvTimeoutError::Disconnected) => debug!("MCP bridge already stopped"),
            }
        }

        let deadline = Instant::now() + THREAD_EXIT_TIMEOUT;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        if handle.is_finished() {
            if handle.join().is_err() {
                return Err(ZeptoError::Mcp("MCP bridge thread panicked".to_string()));
            }
        } else {
            warn!("MCP bridge thread did not exit in time; detaching");
        }
        Ok(())
    }
}

impl Drop for McpServerManager {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_all() {
            warn!(error = %e, "MCP shutdown failed");
        }
    }
}

struct ServerHandle {
    /// Distinguishes a restarted server from the one a stale poller watched
    generation: u64,
    requests: mpsc::UnboundedSender<ServerRequest>,
    shutdown: Option<oneshot::Sender<()>>,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

/// Session state owned by the bridge thread.
struct Bridge {
    configs: BTreeMap<String, McpServerConfig>,
    connector: Arc<dyn SessionConnector>,
    options: McpServerManagerOptions,
    servers: HashMap<String, ServerHandle>,
    next_generation: u64,
    commands: mpsc::UnboundedSender<Command>,
}

fn run_bridge(mut bridge: Bridge, mut commands: mpsc::UnboundedReceiver<Command>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to build MCP runtime");
            return;
        }
    };

    runtime.block_on(async move {
        while let Some(command) = commands.recv().await {
            if let Command::Shutdown { reply } = command {
                bridge.shutdown().await;
                let _ = reply.send(());
                return;
            }
            bridge.handle(command);
        }
        bridge.shutdown().await;
    });
    debug!("MCP bridge thread exiting");
}

impl Bridge {
    fn handle(&mut self, command: Command) {
        match command {
            Command::Start { name, reply } => self.start(name, reply),
            Command::ListTools { name, reply } => {
                self.forward(&name, ServerRequest::ListTools { reply });
            }
            Command::CallTool {
                name,
                tool,
                arguments,
                reply,
            } => {
                self.forward(
                    &name,
                    ServerRequest::CallTool {
                        tool,
                        arguments,
                        reply,
                    },
                );
            }
            Command::StartFailed { name, generation } => {
                let current = self.servers.get(&name).map(|h| h.generation);
                if current != Some(generation) {
                    debug!(server = %name, generation, "Ignoring stale start failure");
                    return;
                }
                if let Some(mut handle) = self.servers.remove(&name) {
                    if let Some(tx) = handle.shutdown.take() {
                        let _ = tx.send(());
                    }
                    handle.task.abort();
                }
            }
            // Handled by the run loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn start(&mut self, name: String, reply: Reply<()>) {
        let Some(config) = self.configs.get(&name).cloned() else {
            let _ = reply.send(Err(ZeptoError::NotFound(format!(
                "Server '{}' not found in configuration",
                name
            ))));
            return;
        };

        let (state, generation) = match self.servers.get(&name) {
            Some(handle) => (handle.state.clone(), handle.generation),
            None => {
                let log = match self.open_log(&name) {
                    Ok(file) => file,
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return;
                    }
                };
                let handle = self.spawn_server(&name, config, log);
                let entry = (handle.state.clone(), handle.generation);
                self.servers.insert(name.clone(), handle);
                entry
            }
        };

        let commands = self.commands.clone();
        let polls = self.options.startup_polls;
        let interval = self.options.poll_interval;
        tokio::spawn(async move {
            let result = await_ready(&name, state, polls, interval).await;
            if result.is_err() {
                let _ = commands.send(Command::StartFailed {
                    name: name.clone(),
                    generation,
                });
            }
            let _ = reply.send(result);
        });
    }

    fn open_log(&self, name: &str) -> Result<File> {
        std::fs::create_dir_all(&self.options.state_dir)?;
        let path = self.options.state_dir.join(format!("mcp-{}.log", name));
        Ok(OpenOptions::new().create(true).append(true).open(path)?)
    }

    fn spawn_server(&mut self, name: &str, config: McpServerConfig, log: File) -> ServerHandle {
        self.next_generation += 1;
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(SessionState::NotStarted);

        let task = tokio::spawn(run_server(
            name.to_string(),
            config,
            log,
            Arc::clone(&self.connector),
            request_rx,
            shutdown_rx,
            state_tx,
        ));

        ServerHandle {
            generation: self.next_generation,
            requests: request_tx,
            shutdown: Some(shutdown_tx),
            state: state_rx,
            task,
        }
    }

    fn forward(&self, name: &str, request: ServerRequest) {
        match self.servers.get(name) {
            Some(handle) if *handle.state.borrow() == SessionState::Running => {
                if let Err(rejected) = handle.requests.send(request) {
                    rejected.0.fail(not_running(name));
                }
            }
            _ => request.fail(not_running(name)),
        }
    }

    async fn shutdown(&mut self) {
        if self.servers.is_empty() {
            return;
        }
        info!(servers = self.servers.len(), "Shutting down MCP servers");

        let mut tasks = Vec::new();
        for (_, mut handle) in self.servers.drain() {
            if let Some(tx) = handle.shutdown.take() {
                let _ = tx.send(());
            }
            tasks.push(handle.task);
        }

        let aborts: Vec<_> = tasks.iter().map(|t| t.abort_handle()).collect();
        let joined =
            tokio::time::timeout(self.options.shutdown_timeout, futures::future::join_all(tasks))
                .await;
        if joined.is_err() {
            warn!("MCP servers did not stop in time; cancelling");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

async fn await_ready(
    name: &str,
    state: watch::Receiver<SessionState>,
    polls: u32,
    interval: Duration,
) -> Result<()> {
    for _ in 0..polls {
        match *state.borrow() {
            SessionState::Running => return Ok(()),
            SessionState::ShuttingDown | SessionState::Stopped => {
                return Err(ZeptoError::Mcp(format!("Server '{}' failed to start", name)));
            }
            SessionState::NotStarted | SessionState::Starting => {}
        }
        tokio::time::sleep(interval).await;
    }
    if *state.borrow() == SessionState::Running {
        return Ok(());
    }
    warn!(server = %name, "MCP server startup timed out");
    Err(ZeptoError::Timeout(format!("Server '{}' failed to start", name)))
}

async fn run_server(
    name: String,
    config: McpServerConfig,
    log: File,
    connector: Arc<dyn SessionConnector>,
    mut requests: mpsc::UnboundedReceiver<ServerRequest>,
    mut shutdown: oneshot::Receiver<()>,
    state: watch::Sender<SessionState>,
) {
    let _ = state.send(SessionState::Starting);

    let connected = tokio::select! {
        result = connector.connect(&name, &config, log) => result,
        _ = &mut shutdown => {
            let _ = state.send(SessionState::Stopped);
            return;
        }
    };
    let mut session: Box<dyn McpSession> = match connected {
        Ok(session) => session,
        Err(e) => {
            warn!(server = %name, error = %e, "MCP server failed to start");
            let _ = state.send(SessionState::Stopped);
            return;
        }
    };

    info!(server = %name, "MCP server running");
    let _ = state.send(SessionState::Running);

    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(ServerRequest::ListTools { reply }) => {
                    let _ = reply.send(session.list_tools().await);
                }
                Some(ServerRequest::CallTool { tool, arguments, reply }) => {
                    debug!(server = %name, tool = %tool, "Calling MCP tool");
                    let _ = reply.send(session.call_tool(&tool, arguments).await);
                }
                None => break,
            },
            _ = &mut shutdown => break,
        }
    }

    let _ = state.send(SessionState::ShuttingDown);
    if let Err(e) = session.close().await {
        warn!(server = %name, error = %e, "Error closing MCP session");
    }
    let _ = state.send(SessionState::Stopped);
    info!(server = %name, "MCP server stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Probe {
        connects: AtomicUsize,
        closed: AtomicBool,
    }

    enum Behavior {
        Ready,
        Fail,
        Hang,
    }

    struct FakeConnector {
        behavior: Behavior,
        probe: Arc<Probe>,
    }

    struct FakeSession {
        probe: Arc<Probe>,
    }

    #[async_trait]
    impl McpSession for FakeSession {
        async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
            Ok(vec![McpTool {
                name: "echo".to_string(),
                description: "Echo text".to_string(),
                input_schema: json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            }])
        }

        async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value> {
            Ok(json!([{"type": "text", "text": format!("{}: {}", name, arguments)}]))
        }

        async fn close(&mut self) -> Result<()> {
            self.probe.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl SessionConnector for FakeConnector {
        async fn connect(
            &self,
            _name: &str,
            _config: &McpServerConfig,
            _log: File,
        ) -> Result<Box<dyn McpSession>> {
            self.probe.connects.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Ready => Ok(Box::new(FakeSession {
                    probe: Arc::clone(&self.probe),
                })),
                Behavior::Fail => Err(ZeptoError::Mcp("spawn failed".to_string())),
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    fn manager(behavior: Behavior) -> (McpServerManager, Arc<Probe>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let probe = Arc::new(Probe::default());
        let mut configs = BTreeMap::new();
        configs.insert("fake".to_string(), McpServerConfig::new("fake-server"));
        let options = McpServerManagerOptions {
            state_dir: dir.path().to_path_buf(),
            startup_polls: 5,
            poll_interval: Duration::from_millis(10),
            shutdown_timeout: Duration::from_millis(500),
        };
        let connector = Arc::new(FakeConnector {
            behavior,
            probe: Arc::clone(&probe),
        });
        let manager = McpServerManager::with_connector(configs, connector, options).unwrap();
        (manager, probe, dir)
    }

    #[test]
    fn test_shutdown_without_servers() {
        let (manager, probe, _dir) = manager(Behavior::Ready);
        assert!(manager.is_running());
        manager.shutdown_all().unwrap();
        assert!(!manager.is_running());
        manager.shutdown_all().unwrap();
        assert_eq!(probe.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unconfigured_server_not_found() {
        let (manager, probe, dir) = manager(Behavior::Ready);
        let err = manager.start_server("nope").unwrap_err();
        assert!(
            matches!(err, ZeptoError::NotFound(ref m) if m == "Server 'nope' not found in configuration")
        );
        assert_eq!(probe.connects.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("mcp-nope.log").exists());
    }

    #[test]
    fn test_start_list_call_and_shutdown() {
        let (manager, probe, dir) = manager(Behavior::Ready);
        manager.start_server("fake").unwrap();
        manager.start_server("fake").unwrap();
        assert_eq!(probe.connects.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("mcp-fake.log").exists());

        let tools = manager.list_tools("fake").unwrap();
        assert_eq!(tools[0].name, "echo");

        let result = manager.call_tool("fake", "echo", json!({"text": "hi"})).unwrap();
        assert_eq!(result[0]["text"], "echo: {\"text\":\"hi\"}");

        manager.shutdown_all().unwrap();
        assert!(probe.closed.load(Ordering::SeqCst));
        assert!(manager.list_tools("fake").is_err());
    }

    #[test]
    fn test_requests_before_start_fail() {
        let (manager, _probe, _dir) = manager(Behavior::Ready);
        let err = manager.list_tools("fake").unwrap_err();
        assert!(matches!(err, ZeptoError::Mcp(ref m) if m == "Server 'fake' is not running"));
        let err = manager.call_tool("fake", "echo", json!({})).unwrap_err();
        assert!(matches!(err, ZeptoError::Mcp(ref m) if m == "Server 'fake' is not running"));
    }

    #[test]
    fn test_startup_timeout_allows_retry() {
        let (manager, probe, _dir) = manager(Behavior::Hang);
        let err = manager.start_server("fake").unwrap_err();
        assert!(matches!(err, ZeptoError::Timeout(ref m) if m == "Server 'fake' failed to start"));

        let err = manager.start_server("fake").unwrap_err();
        assert!(matches!(err, ZeptoError::Timeout(_)));
        assert_eq!(probe.connects.load(Ordering::SeqCst), 2);
        manager.shutdown_all().unwrap();
    }

    #[test]
    fn test_failed_connect() {
        let (manager, _probe, _dir) = manager(Behavior::Fail);
        let err = manager.start_server("fake").unwrap_err();
        assert!(matches!(err, ZeptoError::Mcp(ref m) if m == "Server 'fake' failed to start"));
        assert!(manager.list_tools("fake").is_err());
    }

    #[test]
    fn test_commands_after_shutdown() {
        let (manager, _probe, _dir) = manager(Behavior::Ready);
        manager.shutdown_all().unwrap();
        let err = manager.start_server("fake").unwrap_err();
        assert!(matches!(err, ZeptoError::Mcp(_)));
    }

    async fn start_and_wait(bridge: &mut Bridge, name: &str) -> Result<()> {
        let (tx, rx) = sync_channel(1);
        bridge.start(name.to_string(), tx);
        loop {
            if let Ok(result) = rx.try_recv() {
                return result;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_stale_start_failure_keeps_restarted_server() {
        let dir = tempfile::tempdir().unwrap();
        let probe = Arc::new(Probe::default());
        let mut configs = BTreeMap::new();
        configs.insert("fake".to_string(), McpServerConfig::new("fake-server"));
        let (commands, _pending) = mpsc::unbounded_channel();
        let mut bridge = Bridge {
            configs,
            connector: Arc::new(FakeConnector {
                behavior: Behavior::Ready,
                probe: Arc::clone(&probe),
            }),
            options: McpServerManagerOptions {
                state_dir: dir.path().to_path_buf(),
                startup_polls: 20,
                poll_interval: Duration::from_millis(5),
                shutdown_timeout: Duration::from_millis(500),
            },
            servers: HashMap::new(),
            next_generation: 0,
            commands,
        };

        start_and_wait(&mut bridge, "fake").await.unwrap();
        let first = bridge.servers["fake"].generation;
        bridge.handle(Command::StartFailed {
            name: "fake".to_string(),
            generation: first,
        });
        assert!(!bridge.servers.contains_key("fake"));

        start_and_wait(&mut bridge, "fake").await.unwrap();
        let second = bridge.servers["fake"].generation;
        assert_ne!(first, second);

        // A poller of the first session reporting late must not touch the new one.
        bridge.handle(Command::StartFailed {
            name: "fake".to_string(),
            generation: first,
        });
        assert_eq!(bridge.servers["fake"].generation, second);
        assert_eq!(*bridge.servers["fake"].state.borrow(), SessionState::Running);
        assert_eq!(probe.connects.load(Ordering::SeqCst), 2);

        bridge.shutdown().await;
    }
}
