//! Context command handlers.

use anyhow::{Context, Result};
use serde_json::Map;

use zeptoagent::config::Config;
use zeptoagent::memory::{ContextManager, ContextType};
use zeptoagent::utils::string::preview;

use super::ContextAction;

pub(crate) fn cmd_context(config: &Config, action: ContextAction) -> Result<()> {
    let store = ContextManager::new(config.context.max_age_days);
    match action {
        ContextAction::List {
            context_type,
            limit,
        } => cmd_context_list(&store, context_type, limit),
        ContextAction::Add { text, context_type } => cmd_context_add(&store, &text, context_type),
        ContextAction::Clear { context_type } => cmd_context_clear(&store, context_type),
        ContextAction::Summary => cmd_context_summary(&store),
    }
}

fn cmd_context_list(
    store: &ContextManager,
    context_type: Option<ContextType>,
    limit: Option<usize>,
) -> Result<()> {
    let entries = store
        .get_context(context_type, None, limit)
        .with_context(|| "Failed to read context")?;

    if entries.is_empty() {
        match context_type {
            Some(t) => println!("No '{}' context stored.", t),
            None => {
                println!("No context stored yet.");
                println!("Add some: zeptoagent context add \"Working on the billing API\"");
            }
        }
        return Ok(());
    }

    println!("Context ({})", entries.len());
    println!("{}", "-".repeat(60));
    for entry in &entries {
        println!(
            "  [{}] {} ({})",
            entry.context_type,
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.source
        );
        println!("    {}", preview(&entry.content, 100));
    }
    Ok(())
}

fn cmd_context_add(store: &ContextManager, text: &str, context_type: ContextType) -> Result<()> {
    let entry = store
        .add_context(context_type, "manual", text, Map::new())
        .with_context(|| "Failed to store context")?;
    println!("Added {} context ({}).", entry.context_type, entry.id);
    Ok(())
}

fn cmd_context_clear(store: &ContextManager, context_type: Option<ContextType>) -> Result<()> {
    let removed = store
        .clear_context(context_type)
        .with_context(|| "Failed to clear context")?;
    match context_type {
        Some(t) => println!("Removed {} '{}' entries.", removed, t),
        None => println!("Removed {} entries.", removed),
    }
    Ok(())
}

fn cmd_context_summary(store: &ContextManager) -> Result<()> {
    let summary = store
        .get_context_summary()
        .with_context(|| "Failed to read context")?;

    println!("Context Summary");
    println!("{}", "-".repeat(40));
    println!("  Total entries: {}", summary.total_entries);
    for (context_type, count) in &summary.by_type {
        println!("  {:<14} {}", format!("{}:", context_type), count);
    }
    if let (Some(oldest), Some(newest)) = (summary.oldest_entry, summary.newest_entry) {
        println!("  Oldest:        {}", oldest.format("%Y-%m-%d %H:%M"));
        println!("  Newest:        {}", newest.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}
