//! Agent command handlers (interactive + single message mode).

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use zeptoagent::agent::{AgentLoop, ContextBuilder, ToolDispatcher, TurnOutcome};
use zeptoagent::config::Config;
use zeptoagent::display::{OutputEvent, OutputSink, TerminalSink};
use zeptoagent::log_component;
use zeptoagent::memory::{ContextExtractor, ContextManager};
use zeptoagent::providers::{LLMProvider, OpenAIProvider};
use zeptoagent::session::MessageStorage;
use zeptoagent::tools::mcp::{McpServerManager, McpToolAdapter};
use zeptoagent::tools::{register_builtin_tools, StdinPrompter, ToolContext, ToolRegistry};

/// Interactive or single-message agent mode.
///
/// MCP servers are shut down on every return path; Ctrl+C shuts them down
/// before the process exits.
pub(crate) fn cmd_agent(config: Config, message: Option<String>) -> Result<()> {
    let sink: Arc<dyn OutputSink> = Arc::new(TerminalSink::new());
    let provider: Arc<dyn LLMProvider> = Arc::new(
        OpenAIProvider::from_config(&config.llm)
            .with_context(|| "Failed to create LLM provider")?,
    );

    let registry = Arc::new(ToolRegistry::new());
    register_builtin_tools(&registry);

    let manager = start_mcp_servers(&config, &registry, sink.as_ref())?;
    install_interrupt_handler(manager.clone());

    let result = run_agent(&config, provider, registry, sink, message);

    if let Some(manager) = manager {
        if let Err(e) = manager.shutdown_all() {
            warn!(error = %e, "MCP shutdown failed");
        }
    }
    result
}

fn run_agent(
    config: &Config,
    provider: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    sink: Arc<dyn OutputSink>,
    message: Option<String>,
) -> Result<()> {
    let store = Arc::new(ContextManager::new(config.context.max_age_days));
    let mut builder = ContextBuilder::new()
        .with_context_dir(config.context_dir())
        .with_recent_context(
            store.clone(),
            config.context.recent_hours,
            config.context.per_type_limit,
        );
    if let Some(prompt) = &config.agent.system_prompt {
        builder = builder.with_system_prompt(prompt);
    }

    let dispatcher = ToolDispatcher::new(
        registry,
        Box::new(StdinPrompter),
        ToolContext::new(sink.clone()),
    );
    let mut agent = AgentLoop::new(provider.clone(), dispatcher, sink)
        .with_context_builder(builder)
        .with_storage(MessageStorage::new(config.agent.max_messages))
        .with_max_iterations(config.agent.max_tool_iterations);
    if config.context.enabled {
        agent = agent.with_extractor(Arc::new(ContextExtractor::new(provider, store)));
    }

    let result = match message {
        Some(msg) => match agent.process_turn(&msg) {
            TurnOutcome::Aborted(e) => Err(anyhow::anyhow!("Turn failed: {}", e)),
            _ => Ok(()),
        },
        None => interactive(&mut agent),
    };

    agent.wait_for_background();
    result
}

fn interactive(agent: &mut AgentLoop) -> Result<()> {
    println!("ZeptoAgent");
    println!("Type your message and press Enter. Type 'quit' or 'exit' to stop.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                // EOF
                println!();
                break;
            }
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "quit" || input == "exit" {
                    println!("Goodbye!");
                    break;
                }
                agent.process_turn(input);
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }
    Ok(())
}

/// Start every configured MCP server and register its tools.
///
/// Returns `None` when MCP is disabled or nothing is configured.
fn start_mcp_servers(
    config: &Config,
    registry: &ToolRegistry,
    sink: &dyn OutputSink,
) -> Result<Option<Arc<McpServerManager>>> {
    if config.mcp_disabled || config.mcp_servers.is_empty() {
        return Ok(None);
    }

    let manager = Arc::new(
        McpServerManager::new(config.mcp_servers.clone())
            .with_context(|| "Failed to start the MCP bridge")?,
    );
    let adapter = McpToolAdapter::new(manager.clone());
    let registered = adapter.start_all(registry, |server, error| {
        sink.emit(OutputEvent::Warning(format!(
            "MCP server '{}' unavailable: {}",
            server, error
        )));
    });
    log_component!(info, "mcp", "Registered MCP tools", tools = registered as u64);
    Ok(Some(manager))
}

/// On Ctrl+C, stop MCP servers and exit.
fn install_interrupt_handler(manager: Option<Arc<McpServerManager>>) {
    let spawned = std::thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!(error = %e, "Could not install Ctrl+C handler");
                    return;
                }
            };
            if runtime.block_on(tokio::signal::ctrl_c()).is_err() {
                return;
            }
            println!();
            if let Some(manager) = manager {
                if let Err(e) = manager.shutdown_all() {
                    warn!(error = %e, "MCP shutdown failed");
                }
            }
            std::process::exit(130);
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Could not install Ctrl+C handler");
    }
}
