//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

use pomo_core::ValidationError;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file exists but could not be read.
    #[error("failed to read store file {path}: {error}")]
    Read { path: PathBuf, error: String },

    /// The store file could not be written.
    #[error("failed to write store file {path}: {error}")]
    Write { path: PathBuf, error: String },

    /// The store document is not a JSON object of the expected shape.
    #[error("store document is corrupt: {0}")]
    Corrupt(String),

    /// A record failed schema validation on a read or write boundary.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Faults raised while repairing legacy store data.
///
/// These never propagate out of [`crate::TimerStore::open`]: the
/// recovery policy trades the unreadable data away (tasks are discarded,
/// the active-task reference is cleared) so the daemon can start.
#[derive(Debug, Clone, Error)]
pub enum MigrationError {
    /// The tasks section could not be decoded into a task list.
    #[error("tasks section could not be decoded: {0}")]
    UnreadableTasks(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Read {
            path: PathBuf::from("/tmp/store.json"),
            error: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("/tmp/store.json"));
        assert!(err.to_string().contains("permission denied"));

        let err = StoreError::Corrupt("not an object".to_string());
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn test_validation_error_converts() {
        let err: StoreError = ValidationError::invalid("title", "", "1..=200 characters").into();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
