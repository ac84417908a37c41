//! Error types for the I/O edges (settings persistence, export files).
//!
//! The window core itself never fails: absent or stale targets are no-ops.

use thiserror::Error;

/// Result type with slim-specific error
pub type SlimResult<T> = Result<T, SlimError>;

/// Failures at the edges of the system.
#[derive(Debug, Error)]
pub enum SlimError {
    /// Settings could not be read or written.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Low-level I/O error from std::io.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transcript or other input did not describe a usable conversation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
