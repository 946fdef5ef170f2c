//! Live timer state and break-kind derivation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Validate, ValidationError};
use crate::settings::TimerSettings;
use crate::task::TaskId;

// ============================================================================
// Break Kind
// ============================================================================

/// Which kind of break a completed work segment leads into.
///
/// The live state only carries an `is_break` flag - the kind is derived
/// from the completed-pomodoro count at the moment of transition, never
/// stored. Observers that need the distinction derive it from a
/// snapshot the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    Short,
    Long,
}

impl BreakKind {
    /// Derives the break kind that follows the Nth completed work
    /// segment, using the post-increment count. An interval of zero
    /// never yields a long break.
    #[must_use]
    pub fn after_completion(completed_pomodoros: u32, long_break_interval: u32) -> Self {
        if long_break_interval > 0 && completed_pomodoros % long_break_interval == 0 {
            Self::Long
        } else {
            Self::Short
        }
    }
}

impl fmt::Display for BreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => write!(f, "short break"),
            Self::Long => write!(f, "long break"),
        }
    }
}

// ============================================================================
// Timer State
// ============================================================================

/// The countdown state owned by the timer engine.
///
/// Exactly one live instance exists per daemon; everything observers
/// see is a cloned snapshot. The default value (all zeros, paused,
/// work mode) is the persisted-snapshot placeholder used before any
/// engine has run; a live engine starts from [`TimerState::initial`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerState {
    /// Seconds remaining in the current segment.
    pub time_left: u32,

    /// Whether the clock is ticking.
    pub is_running: bool,

    /// Whether the current segment is a break.
    pub is_break: bool,

    /// Work segments completed since the last reset.
    pub completed_pomodoros: u32,

    /// Non-owning reference to the active task, if any.
    pub current_task_id: Option<TaskId>,
}

impl TimerState {
    /// The state a freshly constructed engine starts from: a paused
    /// work segment of the configured length.
    #[must_use]
    pub fn initial(settings: &TimerSettings) -> Self {
        Self {
            time_left: settings.work_secs(),
            is_running: false,
            is_break: false,
            completed_pomodoros: 0,
            current_task_id: None,
        }
    }
}

impl Validate for TimerState {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(task_id) = &self.current_task_id {
            if task_id.as_str().is_empty() {
                return Err(ValidationError::invalid(
                    "current_task_id",
                    "",
                    "non-empty identifier or null",
                ));
            }
        }
        Ok(())
    }
}
