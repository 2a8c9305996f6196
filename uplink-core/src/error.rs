//! Error types for uplink cache operations

use thiserror::Error;

/// Result alias for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Record store errors.
///
/// These cover I/O failures of the backing store. The cache is a
/// best-effort layer: the facade catches these, logs them, and degrades
/// to benign results instead of propagating.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A stored row could not be decoded.
    #[error("Malformed record encoding: {0}")]
    Codec(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache worker task is gone and can no longer accept commands.
    #[error("Cache worker is no longer running")]
    WorkerGone,
}

/// Configuration errors.
///
/// Surfaced at construction time only. An invalid configuration is never
/// created, so a running cache cannot hold one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid cache location: {reason}")]
    InvalidLocation { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::EnvOpen("permission denied".to_string());
        assert!(err.to_string().contains("permission denied"));

        let err = ConfigError::InvalidLocation {
            reason: "URL-style location".to_string(),
        };
        assert!(err.to_string().contains("URL-style location"));
    }
}
