//! Protocol message types for daemon communication.

use serde::{Deserialize, Serialize};

use pomo_core::{Task, TimerSettings, TimerState, TimerStats};

use crate::version::ProtocolVersion;

/// Message types that can be sent by clients to the daemon.
///
/// The record-bearing variants carry fully typed payloads; anything
/// that fails to deserialize into the declared shape is rejected at the
/// connection layer before it can reach the store or the timer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageType {
    /// Client handshake/connection request
    Connect {
        /// Client identifier (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// Request the persisted timer settings
    GetSettings,

    /// Validate, persist, and push new settings into the timer engine
    SaveSettings { settings: TimerSettings },

    /// Request the persisted stats counters
    GetStats,

    /// Validate and persist stats counters
    SaveStats { stats: TimerStats },

    /// Zero the stats counters and stamp the reset time
    ResetStats,

    /// Request the persisted task list
    GetTasks,

    /// Validate and persist the task list wholesale
    SaveTasks { tasks: Vec<Task> },

    /// Request the view layer's persisted timer-state snapshot
    GetTimerState,

    /// Validate and persist a view-layer timer-state snapshot
    SaveTimerState { state: TimerState },

    /// Start the live countdown
    TimerStart,

    /// Pause the live countdown
    TimerPause,

    /// Reset the live countdown to a fresh work segment
    TimerReset,

    /// Request a snapshot of the live countdown
    TimerGetState,

    /// Subscribe to tick and completion broadcasts
    Subscribe,

    /// Unsubscribe from broadcasts
    Unsubscribe,

    /// Ping to check connection
    Ping {
        /// Sequence number for matching pong response
        seq: u64,
    },

    /// Client disconnecting gracefully
    Disconnect,
}

/// Messages sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Protocol version
    pub protocol_version: ProtocolVersion,

    /// Message payload
    #[serde(flatten)]
    pub message: MessageType,
}

impl ClientMessage {
    /// Creates a new client message with current protocol version.
    pub fn new(message: MessageType) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            message,
        }
    }

    /// Creates a connect message.
    pub fn connect(client_id: Option<String>) -> Self {
        Self::new(MessageType::Connect { client_id })
    }

    /// Creates a save-settings message.
    pub fn save_settings(settings: TimerSettings) -> Self {
        Self::new(MessageType::SaveSettings { settings })
    }

    /// Creates a save-stats message.
    pub fn save_stats(stats: TimerStats) -> Self {
        Self::new(MessageType::SaveStats { stats })
    }

    /// Creates a save-tasks message.
    pub fn save_tasks(tasks: Vec<Task>) -> Self {
        Self::new(MessageType::SaveTasks { tasks })
    }

    /// Creates a save-timer-state message.
    pub fn save_timer_state(state: TimerState) -> Self {
        Self::new(MessageType::SaveTimerState { state })
    }

    /// Creates a ping message.
    pub fn ping(seq: u64) -> Self {
        Self::new(MessageType::Ping { seq })
    }

    /// Creates a disconnect message.
    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect)
    }
}

/// Messages sent from daemon to clients.
///
/// Responses answer a specific request; `TimerTick` and `TimerComplete`
/// are broadcast events pushed to every subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Connection accepted
    Connected {
        /// Daemon's protocol version
        protocol_version: ProtocolVersion,
        /// Assigned client ID
        client_id: String,
    },

    /// Connection rejected (version mismatch, etc.)
    Rejected {
        /// Reason for rejection
        reason: String,
        /// Daemon's protocol version (for client to upgrade)
        protocol_version: ProtocolVersion,
    },

    /// Persisted timer settings
    Settings { settings: TimerSettings },

    /// Persisted stats counters
    Stats { stats: TimerStats },

    /// Persisted task list
    Tasks { tasks: Vec<Task> },

    /// A timer-state snapshot (live or persisted, depending on request)
    TimerState { state: TimerState },

    /// Command accepted, no payload to return
    Ack,

    /// Broadcast: the live state changed (tick, start, pause, reset,
    /// or post-completion transition)
    TimerTick { state: TimerState },

    /// Broadcast: a segment ran down to zero.
    ///
    /// Carries the pre-transition mode flag and the completion count
    /// (a finished work segment counts itself); it deliberately does
    /// not say which break kind finished.
    TimerComplete {
        was_break: bool,
        completed_pomodoros: u32,
    },

    /// Pong response to ping
    Pong {
        /// Sequence number from ping
        seq: u64,
    },

    /// Error response
    Error {
        /// Error message
        message: String,
        /// Error code (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl DaemonMessage {
    /// Creates a connected response.
    pub fn connected(client_id: String) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            client_id,
        }
    }

    /// Creates a rejected response.
    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    /// Creates a settings response.
    pub fn settings(settings: TimerSettings) -> Self {
        Self::Settings { settings }
    }

    /// Creates a stats response.
    pub fn stats(stats: TimerStats) -> Self {
        Self::Stats { stats }
    }

    /// Creates a tasks response.
    pub fn tasks(tasks: Vec<Task>) -> Self {
        Self::Tasks { tasks }
    }

    /// Creates a timer-state response.
    pub fn timer_state(state: TimerState) -> Self {
        Self::TimerState { state }
    }

    /// Creates a tick broadcast.
    pub fn timer_tick(state: TimerState) -> Self {
        Self::TimerTick { state }
    }

    /// Creates a completion broadcast.
    pub fn timer_complete(was_break: bool, completed_pomodoros: u32) -> Self {
        Self::TimerComplete {
            was_break,
            completed_pomodoros,
        }
    }

    /// Creates a pong response.
    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    /// Creates an error response.
    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: None,
        }
    }

    /// Creates an error response with code.
    pub fn error_with_code(message: &str, code: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: Some(code.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_serialization() {
        let msg = ClientMessage::ping(42);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"ping\""));
        assert!(json.contains("\"seq\":42"));
    }

    #[test]
    fn test_daemon_message_serialization() {
        let msg = DaemonMessage::connected("client-3".to_string());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"client_id\":\"client-3\""));
    }

    #[test]
    fn test_save_settings_roundtrip() {
        let original = ClientMessage::save_settings(TimerSettings::default());
        let json = serde_json::to_string(&original).unwrap();
        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();

        match parsed.message {
            MessageType::SaveSettings { settings } => {
                assert_eq!(settings, TimerSettings::default());
            }
            other => panic!("expected SaveSettings, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_settings_payload_fails_to_parse() {
        // work_duration must be an integer - a string payload is refused
        // by deserialization before any handler sees it
        let json = r#"{"protocol_version":{"major":1,"minor":0},"type":"save_settings","settings":{"work_duration":"25","short_break_duration":5,"long_break_duration":15,"long_break_interval":4,"auto_start_breaks":false,"auto_start_pomodoros":false,"sound_enabled":true}}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_timer_complete_event_shape() {
        let msg = DaemonMessage::timer_complete(false, 4);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"timer_complete\""));
        assert!(json.contains("\"was_break\":false"));
        assert!(json.contains("\"completed_pomodoros\":4"));
        // the event shape carries no break-kind field
        assert!(!json.contains("kind"));
    }
}
