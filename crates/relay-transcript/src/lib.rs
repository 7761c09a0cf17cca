//! Stream-to-state adapter: the core of Relay.
//!
//! Consumes the ordered event stream for one user turn and, in
//! lockstep, renders it to a `RenderSink` and folds it into the
//! persisted `Conversation`. On the next turn, history reconstitution
//! rebuilds the structured message sequence the reasoning service
//! expects from the flat persisted log.

pub mod config;
pub mod driver;
pub mod errors;
pub mod fold;
pub mod history;
pub mod render;
pub mod sanitize;

pub use config::*;
pub use driver::*;
pub use errors::*;
pub use fold::*;
pub use history::*;
pub use render::*;
pub use sanitize::*;
