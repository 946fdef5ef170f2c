//! Cumulative usage counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Validate, ValidationError};

/// Cumulative counters maintained by the view layer.
///
/// The timer engine never writes these - it emits completion events and
/// views fold them into the stored stats. The unsigned fields make the
/// non-negativity constraints total at the type level; validation only
/// has the timestamp left to check, and any `chrono` timestamp is
/// acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerStats {
    /// Work segments completed, all time.
    pub total_pomodoros: u32,

    /// Minutes of completed focus time.
    pub total_focus_time: u32,

    /// Minutes of completed break time.
    pub total_break_time: u32,

    /// Tasks marked done.
    pub total_completed_tasks: u32,

    /// When the counters were last reset, if ever.
    pub last_reset_date: Option<DateTime<Utc>>,
}

impl TimerStats {
    /// Fresh counters stamped with the reset time.
    #[must_use]
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            last_reset_date: Some(now),
            ..Self::default()
        }
    }
}

impl Validate for TimerStats {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_counters_are_zero() {
        let stats = TimerStats::default();
        assert_eq!(stats.total_pomodoros, 0);
        assert_eq!(stats.total_focus_time, 0);
        assert_eq!(stats.total_break_time, 0);
        assert_eq!(stats.total_completed_tasks, 0);
        assert!(stats.last_reset_date.is_none());
        assert!(stats.validate().is_ok());
    }

    #[test]
    fn test_fresh_zeroes_counters_and_stamps_reset() {
        let now = Utc::now();
        let stats = TimerStats::fresh(now);
        assert_eq!(stats.total_pomodoros, 0);
        assert_eq!(stats.last_reset_date, Some(now));
    }

    #[test]
    fn test_serde_roundtrip() {
        let stats = TimerStats {
            total_pomodoros: 7,
            total_focus_time: 175,
            total_break_time: 35,
            total_completed_tasks: 2,
            last_reset_date: Some(Utc::now()),
        };
        let json = serde_json::to_string(&stats).unwrap();
        let parsed: TimerStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
    }
}
