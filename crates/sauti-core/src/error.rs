//! Error types for the engine and its collaborators.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or incomplete request data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation is not available with the configured backend.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The job was canceled at a cooperative checkpoint.
    #[error("canceled")]
    Canceled,

    /// Failure reported by a compute collaborator.
    #[error("backend error: {0}")]
    Backend(String),

    /// Envelope encoding or decoding failure.
    #[error("codec error: {0}")]
    Codec(String),

    /// Package acquisition failure.
    #[error("package error: {0}")]
    Package(String),

    /// External transcoder invocation failure.
    #[error("transcode error: {0}")]
    Transcode(String),

    /// The execution engine is no longer accepting jobs.
    #[error("execution engine is not running")]
    EngineStopped,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error represents a cooperative cancellation rather
    /// than a genuine failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Canceled)
    }
}
