use thiserror::Error;

/// Failures surfaced by the event source. Timeouts are owned by the
/// client and arrive through the stream like any other terminal error.
#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("connection to reasoning service failed: {0}")]
    Connection(String),

    #[error("reasoning service request timed out")]
    Timeout,

    #[error("unexpected http status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("event decoding failed: {0}")]
    Decoding(String),
}

impl From<reqwest::Error> for EventSourceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(error.to_string())
        }
    }
}
