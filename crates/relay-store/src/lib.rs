//! Persisted conversation model and state store for Relay.
//!
//! This crate owns the shapes that survive a turn: the role-tagged
//! `Message` log, the canonical `SanitizedResult` every tool output is
//! normalized into, and the `ConversationStore` the turn driver mutates.
//! External chat persistence is reached through the `ChatSaver` callback.

pub mod fs;
pub mod memory;
pub mod message;
pub mod store;

pub use fs::*;
pub use memory::*;
pub use message::*;
pub use store::*;
