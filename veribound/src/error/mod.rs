//! Error types and reporting

use thiserror::Error;

use crate::smt::SmtError;
use crate::transport::TransportError;

/// Result type alias
pub type Result<T> = std::result::Result<T, VeriboundError>;

/// Top-level error for the manager boundary
#[derive(Debug, Error)]
pub enum VeriboundError {
    /// Class names must be non-empty and non-whitespace
    #[error("invalid class name: {0:?}")]
    InvalidClassName(String),

    /// Verification requested for a class that was never registered
    #[error("unknown class: {0}")]
    UnknownClass(String),

    /// Channel or worker-process failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// SMT generation or solver invocation failure
    #[error(transparent)]
    Smt(#[from] SmtError),

    /// The worker reported a failure for this request
    #[error("worker failure: {0}")]
    Worker(String),

    /// The caller-side wait for a correlated result elapsed
    #[error("verification request timed out")]
    RequestTimeout,

    /// Manager already closed
    #[error("manager is closed")]
    Closed,
}

impl VeriboundError {
    /// True for failures of the channel/process layer, which the manager
    /// may recover from by relaunching the worker on the next request.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
