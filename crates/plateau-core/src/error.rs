//! Error types for the Plateau core library

use std::time::Duration;

use thiserror::Error;

use crate::array::ArrayOperationOutcome;

/// Main error type for Plateau operations
#[derive(Error, Debug)]
pub enum Error {
    /// An injected collaborator (workload generator, device tool) failed
    #[error("Tool invocation failed: {0}")]
    ToolInvocation(String),

    /// Invalid orchestration parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Steady-state check invoked on an empty or zero-average window
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// A round index was pushed out of sequence into a measurement window
    #[error("Non-contiguous round index: expected {expected}, got {actual}")]
    NonContiguousRound {
        /// Round index the window expected next
        expected: usize,
        /// Round index actually pushed
        actual: usize,
    },

    /// One or more array member operations failed during a fan-out
    #[error("{} of {} array member operations failed: {}", .0.failures().count(), .0.members.len(), .0.failure_summary())]
    AggregateOperation(ArrayOperationOutcome),

    /// The array never reported ready within the maximum wait
    #[error("Array not ready after {waited:?}")]
    Timeout {
        /// How long readiness was polled for
        waited: Duration,
    },

    /// Operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// A test that already failed was run again
    #[error("Test already failed; start a new one to retry")]
    AlreadyFailed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using the Plateau error type
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single-device operation, carrying the tool's error detail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct OperationError(pub String);

impl OperationError {
    /// Create a new operation error from any message
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }

    /// The error detail string
    pub fn detail(&self) -> &str {
        &self.0
    }
}
