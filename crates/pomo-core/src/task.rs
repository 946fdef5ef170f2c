//! Task entities and identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Validate, ValidationError};

// ============================================================================
// Task Identifier
// ============================================================================

/// Unique identifier for a task.
///
/// The canonical format is a UUID (e.g.
/// "8e11bfb5-7dc2-432b-9206-928fa5c35731"). Stores from older releases
/// may contain non-canonical identifiers, so the wrapper accepts any
/// string and exposes [`TaskId::is_canonical`]; the store's startup
/// migration replaces non-conforming identifiers with freshly generated
/// ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps an existing identifier string without checking its format.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier in the canonical format.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns true if the identifier matches the canonical UUID format.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        Uuid::parse_str(&self.0).is_ok()
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a shortened display form (first 8 characters).
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Task
// ============================================================================

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum estimate a user can assign to a single task.
pub const MAX_ESTIMATED_POMODOROS: u32 = 20;

/// A unit of work the user tracks pomodoros against.
///
/// Tasks are owned by the store and the view layer. The timer engine
/// never mutates a task; it only records which one is active via a
/// non-owning [`TaskId`] reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (canonical format enforced by migration).
    pub id: TaskId,

    /// Short description, 1..=200 characters.
    pub title: String,

    /// Whether the user marked the task done.
    pub completed: bool,

    /// Pomodoros completed against this task.
    pub pomodoros: u32,

    /// User's estimate of pomodoros needed (1..=20).
    pub estimated_pomodoros: u32,
}

impl Task {
    /// Creates a new task with a freshly generated identifier.
    pub fn new(title: impl Into<String>, estimated_pomodoros: u32) -> Self {
        Self {
            id: TaskId::generate(),
            title: title.into(),
            completed: false,
            pomodoros: 0,
            estimated_pomodoros,
        }
    }
}

impl Validate for Task {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.id.as_str().is_empty() {
            return Err(ValidationError::invalid("id", "", "non-empty identifier"));
        }
        let title_len = self.title.chars().count();
        if title_len == 0 || title_len > MAX_TITLE_LEN {
            return Err(ValidationError::invalid(
                "title",
                &self.title,
                "1..=200 characters",
            ));
        }
        if !(1..=MAX_ESTIMATED_POMODOROS).contains(&self.estimated_pomodoros) {
            return Err(ValidationError::invalid(
                "estimated_pomodoros",
                self.estimated_pomodoros,
                "1..=20",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_is_canonical() {
        let id = TaskId::generate();
        assert!(id.is_canonical());
    }

    #[test]
    fn test_non_uuid_id_is_not_canonical() {
        assert!(!TaskId::new("not-a-uuid").is_canonical());
        assert!(!TaskId::new("task-1").is_canonical());
        assert!(!TaskId::new("").is_canonical());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(TaskId::generate(), TaskId::generate());
    }

    #[test]
    fn test_new_task_is_valid() {
        let task = Task::new("Write the report", 3);
        assert!(task.validate().is_ok());
        assert!(!task.completed);
        assert_eq!(task.pomodoros, 0);
    }

    #[test]
    fn test_rejects_empty_title() {
        let mut task = Task::new("x", 1);
        task.title = String::new();
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_title() {
        let task = Task::new("x".repeat(MAX_TITLE_LEN + 1), 1);
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_title_length_counts_chars_not_bytes() {
        // 200 multi-byte characters are within the limit
        let task = Task::new("\u{00e9}".repeat(MAX_TITLE_LEN), 1);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_rejects_estimate_out_of_range() {
        let task = Task::new("x", 0);
        assert!(task.validate().is_err());
        let task = Task::new("x", 21);
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_task_list_validation_stops_at_first_failure() {
        let good = Task::new("ok", 1);
        let mut bad = Task::new("bad", 1);
        bad.title = String::new();
        let tasks = vec![good, bad];
        assert!(tasks.validate().is_err());
    }
}
