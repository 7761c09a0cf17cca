use thiserror::Error;

/// Top-level error type for the transcript adapter.
///
/// Sanitization failures and tool-pairing mismatches never appear here:
/// both are recovered locally with degraded output. Transport and
/// decoding failures abort the current turn only; the driver still
/// finalizes state and render sinks before reporting them.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error(transparent)]
    Source(#[from] relay_events::EventSourceError),

    #[error(transparent)]
    Store(#[from] relay_store::StoreError),

    #[error("history serialization failed: {0}")]
    History(String),
}
