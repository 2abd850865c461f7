//! Error types shared across the weather tracker.

use thiserror::Error;

/// Startup-level failures: configuration and client construction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Failure to obtain a reading for one coordinate pair.
///
/// Callers treat every variant the same way: the entity keeps its previous
/// reading. The split only exists so log lines say what went wrong.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("provider returned status {status}")]
    Status { status: u16 },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Payload(String),
}
