//! Timer engine commands, errors, and events.
//!
//! This module defines the message types for communicating with the
//! `TimerEngine`:
//! - `TimerCommand`: commands sent to the engine
//! - `TimerError`: errors surfaced to command callers
//! - `TimerEvent`: events published by the engine for subscribers

use thiserror::Error;
use tokio::sync::oneshot;

use pomo_core::{TimerSettings, TimerState};

// ============================================================================
// Timer Commands
// ============================================================================

/// Commands sent to the timer engine.
///
/// Each command carries a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking. Start,
/// pause, and reset always succeed - their no-op cases are deliberate
/// silent behaviors, not errors.
#[derive(Debug)]
pub enum TimerCommand {
    /// Begin (or continue) the countdown.
    ///
    /// A no-op if already running, or if the segment has already run
    /// down to zero - the caller must reset first. The latter is
    /// intentional: starting an elapsed segment must not jump state.
    Start {
        /// Channel to acknowledge the command
        respond_to: oneshot::Sender<()>,
    },

    /// Pause the countdown. Idempotent.
    Pause {
        /// Channel to acknowledge the command
        respond_to: oneshot::Sender<()>,
    },

    /// Reset to a fresh, paused work segment. Idempotent.
    ///
    /// Always returns to work mode regardless of the current mode, and
    /// zeroes the completed-pomodoro count and active-task reference.
    Reset {
        /// Channel to acknowledge the command
        respond_to: oneshot::Sender<()>,
    },

    /// Get a snapshot of the current state.
    GetState {
        /// Channel to send the snapshot
        respond_to: oneshot::Sender<TimerState>,
    },

    /// Replace the settings wholesale.
    ///
    /// Only affects future segment lengths; the remaining time of the
    /// segment underway is never rescaled.
    UpdateSettings {
        /// The new (already validated) settings
        settings: TimerSettings,
        /// Channel to acknowledge the command
        respond_to: oneshot::Sender<()>,
    },
}

// ============================================================================
// Timer Errors
// ============================================================================

/// Errors that can occur when talking to the timer engine.
#[derive(Debug, Clone, Error)]
pub enum TimerError {
    /// The engine has shut down and the command channel is closed.
    #[error("timer engine channel closed")]
    ChannelClosed,
}

// ============================================================================
// Timer Events
// ============================================================================

/// Events published by the engine to subscribers.
///
/// Every state-changing operation publishes a `Tick` carrying the full
/// snapshot; a segment running down to zero additionally publishes a
/// `Complete` before the post-transition snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// The state changed (tick, start, pause, reset, or transition).
    Tick {
        /// Snapshot of the state after the change
        state: TimerState,
    },

    /// A segment ran down to zero.
    ///
    /// `was_break` is the mode of the segment that just finished;
    /// a finished work segment is already counted in
    /// `completed_pomodoros`. The event does not distinguish short
    /// from long breaks.
    Complete {
        /// Whether the finished segment was a break
        was_break: bool,
        /// Completed-pomodoro count, including the segment that just
        /// finished if it was work
        completed_pomodoros: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_error_display() {
        assert_eq!(
            TimerError::ChannelClosed.to_string(),
            "timer engine channel closed"
        );
    }

    #[test]
    fn test_event_variants_clone() {
        let tick = TimerEvent::Tick {
            state: TimerState::default(),
        };
        let _cloned = tick.clone();

        let complete = TimerEvent::Complete {
            was_break: false,
            completed_pomodoros: 1,
        };
        let _cloned = complete.clone();
    }

    #[tokio::test]
    async fn test_command_oneshot_pattern() {
        let (tx, rx) = oneshot::channel::<TimerState>();

        tokio::spawn(async move {
            tx.send(TimerState::default()).ok();
        });

        let state = rx.await;
        assert!(state.is_ok());
    }
}
