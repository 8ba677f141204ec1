//! Error classes the REPL reports differently.
//!
//! Everything not listed here travels as a plain `anyhow::Error` and is
//! reported as a generic failure.

use thiserror::Error;

/// Failures talking to the tracker.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The session token expired or was never issued.
    #[error("not logged on")]
    AuthExpired,
    /// The API answered with an error payload.
    #[error("{message} (code {code})")]
    Api { code: i64, message: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Ctrl-C arrived while a request was in flight.
    #[error("interrupted")]
    Interrupted,
    #[error("case {0} not found")]
    NotFound(u64),
    #[error("expected one case for id {id}, got {count}")]
    Inconsistent { id: u64, count: usize },
}

/// Errors the REPL classifies before reporting.
#[derive(Debug, Error)]
pub enum CliError {
    /// The user left a draft empty.
    #[error("aborted")]
    Aborted,
    /// A command ran without what it needs (no case picked, operation not
    /// permitted, not logged in, bad argument).
    #[error("{0}")]
    Precondition(String),
    #[error("invalid draft header: {0}")]
    MalformedHeader(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Shorthand for returning a [`CliError::Precondition`].
macro_rules! precondition {
    ($($arg:tt)*) => {
        return Err($crate::error::CliError::Precondition(format!($($arg)*)).into())
    };
}

pub(crate) use precondition;
