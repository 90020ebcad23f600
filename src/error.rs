//! Error types for the edge node

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the edge node
#[derive(Error, Debug)]
pub enum Error {
    /// Cache miss. Expected and non-fatal; drives the resolution state
    /// machine and is never surfaced to a caller.
    #[error("resource not cached: {key}")]
    NotFound { key: String },

    /// A reply arrived for a correlation id with no pending request.
    /// Recoverable at the facade: the reply is logged and discarded.
    #[error("no pending request for correlation id {0}")]
    UnknownCorrelation(u64),

    /// A pending request was inserted twice under one correlation id.
    /// This is a programming-error condition, not a runtime case.
    #[error("correlation id {0} already has a pending request")]
    DuplicateCorrelation(u64),

    /// The request line could not be parsed into a resource key.
    #[error("malformed request line: {0:?}")]
    MalformedRequest(String),

    /// Configuration error. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level send failure
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
