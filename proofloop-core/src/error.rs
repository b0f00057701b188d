//! Error types for proofloop-core.

use thiserror::Error;

/// Result type alias using proofloop-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a proof session.
///
/// Proof-level failures (a tactic that cannot be repaired, an oracle that
/// finds nothing) are not errors: they are reported through
/// [`crate::engine::ExecutionOutcome`]. This enum covers the cases where the
/// session itself misbehaves.
#[derive(Error, Debug)]
pub enum Error {
    /// Subprocess communication error
    #[error("Subprocess communication error: {0}")]
    SubprocessComm(String),

    /// The session answered with something that does not follow the protocol
    #[error("Session protocol error: {0}")]
    Protocol(String),

    /// The session did not answer in time
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A failed attempt could not put the session back where it started
    #[error("Session restore failed: expected {expected} executed steps, session holds {actual}")]
    RestoreFailed {
        expected: usize,
        actual: usize,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a restore failure.
    pub fn restore_failed(expected: usize, actual: usize) -> Self {
        Self::RestoreFailed {
            expected,
            actual,
            source: None,
        }
    }

    /// Create a restore failure caused by another error.
    pub fn restore_failed_with_source(
        expected: usize,
        actual: usize,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::RestoreFailed {
            expected,
            actual,
            source: Some(Box::new(source)),
        }
    }
}
