//! Event source client for the remote reasoning service.
//!
//! Opens one request per user turn and yields the service's ordered,
//! heterogeneous event stream (`TurnEvent`) over SSE framing. Raw tool
//! payloads are decoded into an explicit `RawPayload` union at this
//! boundary; everything downstream sees canonical values.

pub mod errors;
pub mod events;
pub mod source;
pub mod sse;
pub mod wire;

pub use errors::*;
pub use events::*;
pub use source::*;
pub use sse::*;
pub use wire::*;
