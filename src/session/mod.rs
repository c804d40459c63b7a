//! Session module - Conversation state and its persistence
//!
//! # Example
//!
//! ```
//! use zeptoagent::session::{Message, MessageStorage};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let storage = MessageStorage::with_path(dir.path().join("messages.json"), 50);
//!
//! storage
//!     .save(&[Message::system("prompt"), Message::user("Hello!")])
//!     .unwrap();
//! assert_eq!(storage.load().len(), 1);
//! ```

pub mod history;
pub mod types;

pub use history::{MessageStorage, DEFAULT_MAX_MESSAGES};
pub use types::{Message, Role, ToolCall};
