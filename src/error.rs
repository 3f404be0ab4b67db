//! Relay error types.

use thiserror::Error;

/// Errors raised by the relay core.
///
/// Only [`RelayError::InvalidArgument`] ever reaches a caller directly; the
/// background loops log everything else and keep running.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Outbound text exceeds the platform's length limit
    #[error("outbound message is too long ({length} > {limit})")]
    Encoding { length: usize, limit: usize },

    /// Network failure, timeout or connection error
    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The platform answered with a non-success status
    #[error("{endpoint} returned status {status}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },

    /// An update could not be decoded into an inbound message
    #[error("malformed update: {0}")]
    Protocol(String),

    /// A caller passed an unusable argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl RelayError {
    /// True when the error is a client-side timeout of a request.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RelayError::Transport(e) if e.is_timeout())
    }
}
