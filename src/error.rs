//! Error types for the partition list.

use thiserror::Error;

/// Result type alias for partition list operations.
pub type Result<T> = std::result::Result<T, ListError>;

/// Main error type for partition list operations.
#[derive(Error, Debug)]
pub enum ListError {
    #[error("Partition not found for timestamp {timestamp}")]
    PartitionNotFound { timestamp: i64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Partition starting at {timestamp} failed: {details}")]
    Partition { timestamp: i64, details: String },
}

impl ListError {
    /// Returns true when the error reports a partition missing from the list.
    ///
    /// Callers retiring partitions usually treat this as a lost race with
    /// another retirement rather than as corruption.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ListError::PartitionNotFound { .. })
    }
}
