//! History command handlers.

use anyhow::{Context, Result};

use zeptoagent::config::Config;
use zeptoagent::session::MessageStorage;

use super::HistoryAction;

pub(crate) fn cmd_history(config: &Config, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::Clear => {
            let storage = MessageStorage::new(config.agent.max_messages);
            storage
                .clear()
                .with_context(|| format!("Failed to clear {}", storage.path().display()))?;
            println!("Conversation history cleared.");
            Ok(())
        }
    }
}
