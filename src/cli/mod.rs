//! CLI module - command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod agent;
pub mod context;
pub mod history;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use zeptoagent::config::Config;
use zeptoagent::memory::ContextType;
use zeptoagent::utils::logging::init_logging;

#[derive(Parser)]
#[command(name = "zeptoagent")]
#[command(version)]
#[command(about = "Terminal coding agent with confirmed tool use", long_about = None)]
struct Cli {
    /// Process a single message and exit (non-interactive mode)
    #[arg(short, long)]
    message: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage stored context facts
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },
    /// Manage conversation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
pub enum ContextAction {
    /// List stored context, newest first
    List {
        /// Only entries of this type (manual, file, calendar, task, time_tracking, goal)
        #[arg(long = "type")]
        context_type: Option<ContextType>,
        /// Maximum number of entries to show
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Add a context fact by hand
    Add {
        /// The fact to remember
        text: String,
        /// Context type
        #[arg(long = "type", default_value = "manual")]
        context_type: ContextType,
    },
    /// Remove stored context
    Clear {
        /// Only remove entries of this type
        #[arg(long = "type")]
        context_type: Option<ContextType>,
    },
    /// Show counts and the time range of stored context
    Summary,
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Erase the saved conversation
    Clear,
}

/// Entry point for the CLI.
pub fn run() -> Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load().with_context(|| "Failed to load configuration")?;
    init_logging(&config.logging);

    match cli.command {
        None => agent::cmd_agent(config, cli.message),
        Some(Commands::Context { action }) => context::cmd_context(&config, action),
        Some(Commands::History { action }) => history::cmd_history(&config, action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_single_message() {
        let cli = Cli::try_parse_from(["zeptoagent", "-m", "hello"]).unwrap();
        assert_eq!(cli.message.as_deref(), Some("hello"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_context_commands() {
        let cli = Cli::try_parse_from([
            "zeptoagent", "context", "list", "--type", "task", "--limit", "3",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Context {
                action: ContextAction::List { context_type, limit },
            }) => {
                assert_eq!(context_type, Some(ContextType::Task));
                assert_eq!(limit, Some(3));
            }
            _ => panic!("expected context list"),
        }

        let cli = Cli::try_parse_from(["zeptoagent", "context", "add", "Client: Acme"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Context {
                action: ContextAction::Add { context_type: ContextType::Manual, .. }
            })
        ));

        assert!(Cli::try_parse_from(["zeptoagent", "context", "list", "--type", "bogus"]).is_err());
    }

    #[test]
    fn test_parse_history_clear() {
        let cli = Cli::try_parse_from(["zeptoagent", "history", "clear"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::History {
                action: HistoryAction::Clear
            })
        ));
    }
}
