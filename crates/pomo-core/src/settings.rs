//! Timer configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Validate, ValidationError};
use crate::state::BreakKind;

/// Seconds per configured minute.
const MINUTE_SECS: u32 = 60;

/// User-facing timer configuration.
///
/// Durations are whole minutes; the engine converts to seconds when a
/// segment begins. Settings are loaded once at daemon startup and
/// replaced wholesale on every update - the engine never mutates
/// individual fields, and a mid-segment update never rescales the
/// remaining time of the segment already underway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    /// Length of a work segment in minutes (1..=120).
    pub work_duration: u32,

    /// Length of a short break in minutes (1..=60).
    pub short_break_duration: u32,

    /// Length of a long break in minutes (1..=120).
    pub long_break_duration: u32,

    /// Work segments completed per long break (2..=10).
    pub long_break_interval: u32,

    /// Start the break automatically when a work segment completes.
    pub auto_start_breaks: bool,

    /// Start the next work segment automatically when a break completes.
    pub auto_start_pomodoros: bool,

    /// Views may play a completion sound. Carried as data for views;
    /// the daemon itself never acts on it.
    pub sound_enabled: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            long_break_interval: 4,
            auto_start_breaks: false,
            auto_start_pomodoros: false,
            sound_enabled: true,
        }
    }
}

impl TimerSettings {
    /// Work segment length in seconds.
    #[must_use]
    pub fn work_secs(&self) -> u32 {
        self.work_duration * MINUTE_SECS
    }

    /// Short break length in seconds.
    #[must_use]
    pub fn short_break_secs(&self) -> u32 {
        self.short_break_duration * MINUTE_SECS
    }

    /// Long break length in seconds.
    #[must_use]
    pub fn long_break_secs(&self) -> u32 {
        self.long_break_duration * MINUTE_SECS
    }

    /// Break length in seconds for the given break kind.
    #[must_use]
    pub fn break_secs(&self, kind: BreakKind) -> u32 {
        match kind {
            BreakKind::Short => self.short_break_secs(),
            BreakKind::Long => self.long_break_secs(),
        }
    }
}

impl Validate for TimerSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=120).contains(&self.work_duration) {
            return Err(ValidationError::invalid(
                "work_duration",
                self.work_duration,
                "1..=120 minutes",
            ));
        }
        if !(1..=60).contains(&self.short_break_duration) {
            return Err(ValidationError::invalid(
                "short_break_duration",
                self.short_break_duration,
                "1..=60 minutes",
            ));
        }
        if !(1..=120).contains(&self.long_break_duration) {
            return Err(ValidationError::invalid(
                "long_break_duration",
                self.long_break_duration,
                "1..=120 minutes",
            ));
        }
        if !(2..=10).contains(&self.long_break_interval) {
            return Err(ValidationError::invalid(
                "long_break_interval",
                self.long_break_interval,
                "2..=10 sessions",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = TimerSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.work_duration, 25);
        assert_eq!(settings.short_break_duration, 5);
        assert_eq!(settings.long_break_duration, 15);
        assert_eq!(settings.long_break_interval, 4);
        assert!(!settings.auto_start_breaks);
        assert!(!settings.auto_start_pomodoros);
        assert!(settings.sound_enabled);
    }

    #[test]
    fn test_second_conversions() {
        let settings = TimerSettings::default();
        assert_eq!(settings.work_secs(), 1500);
        assert_eq!(settings.short_break_secs(), 300);
        assert_eq!(settings.long_break_secs(), 900);
        assert_eq!(settings.break_secs(BreakKind::Short), 300);
        assert_eq!(settings.break_secs(BreakKind::Long), 900);
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        let mut settings = TimerSettings::default();
        settings.work_duration = 0;
        assert!(settings.validate().is_err());

        settings = TimerSettings::default();
        settings.work_duration = 121;
        assert!(settings.validate().is_err());

        settings = TimerSettings::default();
        settings.short_break_duration = 61;
        assert!(settings.validate().is_err());

        settings = TimerSettings::default();
        settings.long_break_interval = 1;
        assert!(settings.validate().is_err());

        settings = TimerSettings::default();
        settings.long_break_interval = 11;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let settings = TimerSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: TimerSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
