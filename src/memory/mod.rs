//! Context memory: timestamped facts about what the user is working on.
//!
//! Facts are stored in a flat JSON file by [`ContextManager`], added by hand
//! through the CLI or mined from finished turns by [`ContextExtractor`], and
//! read back as a short summary for the system prompt.

pub mod extractor;
pub mod prompts;
pub mod store;

pub use extractor::{determine_context_type, ContextExtractor};
pub use prompts::ExecutedTool;
pub use store::{ContextEntry, ContextManager, ContextSummary, ContextType};
