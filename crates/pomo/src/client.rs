//! Daemon connection client for the pomo CLI.
//!
//! This module provides the `DaemonClient` which handles connection to
//! the daemon via Unix socket, the protocol handshake, and typed
//! request/response helpers for the full command surface.

use std::env;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

use pomo_core::{Task, TimerSettings, TimerState, TimerStats};
use pomo_protocol::{ClientMessage, DaemonMessage, MessageType};

use crate::error::{CliError, Result};

/// Default socket path, kept in sync with the daemon.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/pomod.sock";

/// Client for communicating with the pomod daemon.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Creates a client for the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Creates a client honoring the `POMO_SOCKET` environment variable.
    pub fn from_env() -> Self {
        let path = env::var("POMO_SOCKET").unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string());
        Self::new(path)
    }

    /// Connects to the daemon and completes the handshake.
    pub async fn connect(&self) -> Result<Connection> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| CliError::Connect {
                path: self.socket_path.display().to_string(),
                error: e.to_string(),
            })?;

        let (reader, writer) = stream.into_split();
        let mut conn = Connection {
            reader: BufReader::new(reader),
            writer,
            client_id: String::new(),
        };

        conn.send(MessageType::Connect { client_id: None }).await?;

        match conn.next_message().await? {
            DaemonMessage::Connected { client_id, .. } => {
                debug!(client_id = %client_id, "connected to daemon");
                conn.client_id = client_id;
                Ok(conn)
            }
            DaemonMessage::Rejected { reason, .. } => Err(CliError::Rejected(reason)),
            other => Err(CliError::Protocol(format!(
                "unexpected handshake response: {other:?}"
            ))),
        }
    }
}

/// An established daemon connection.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    client_id: String,
}

impl Connection {
    /// Returns the client id the daemon assigned.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Sends a message without waiting for a response.
    pub async fn send(&mut self, message: MessageType) -> Result<()> {
        let msg = ClientMessage::new(message);
        let json = serde_json::to_string(&msg).map_err(|e| CliError::Protocol(e.to_string()))?;

        self.writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| CliError::Io(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .await
            .map_err(|e| CliError::Io(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| CliError::Io(e.to_string()))?;

        Ok(())
    }

    /// Reads the next message from the daemon.
    ///
    /// In watch mode this includes broadcast events interleaved with
    /// responses.
    pub async fn next_message(&mut self) -> Result<DaemonMessage> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| CliError::Io(e.to_string()))?;

        if n == 0 {
            return Err(CliError::Io("daemon closed the connection".to_string()));
        }

        serde_json::from_str(&line).map_err(|e| CliError::Protocol(e.to_string()))
    }

    /// Sends a request and reads the next response, surfacing daemon
    /// errors as `CliError::Daemon`.
    async fn request(&mut self, message: MessageType) -> Result<DaemonMessage> {
        self.send(message).await?;
        match self.next_message().await? {
            DaemonMessage::Error { message, .. } => Err(CliError::Daemon(message)),
            other => Ok(other),
        }
    }

    // ========================================================================
    // Typed command helpers
    // ========================================================================

    /// Fetches the persisted timer settings.
    pub async fn get_settings(&mut self) -> Result<TimerSettings> {
        match self.request(MessageType::GetSettings).await? {
            DaemonMessage::Settings { settings } => Ok(settings),
            other => Err(unexpected("settings", &other)),
        }
    }

    /// Persists new settings (the daemon validates and applies them).
    pub async fn save_settings(&mut self, settings: TimerSettings) -> Result<()> {
        match self.request(MessageType::SaveSettings { settings }).await? {
            DaemonMessage::Ack => Ok(()),
            other => Err(unexpected("ack", &other)),
        }
    }

    /// Fetches the persisted stats counters.
    pub async fn get_stats(&mut self) -> Result<TimerStats> {
        match self.request(MessageType::GetStats).await? {
            DaemonMessage::Stats { stats } => Ok(stats),
            other => Err(unexpected("stats", &other)),
        }
    }

    /// Persists stats counters.
    pub async fn save_stats(&mut self, stats: TimerStats) -> Result<()> {
        match self.request(MessageType::SaveStats { stats }).await? {
            DaemonMessage::Ack => Ok(()),
            other => Err(unexpected("ack", &other)),
        }
    }

    /// Zeroes the stats counters.
    pub async fn reset_stats(&mut self) -> Result<()> {
        match self.request(MessageType::ResetStats).await? {
            DaemonMessage::Ack => Ok(()),
            other => Err(unexpected("ack", &other)),
        }
    }

    /// Fetches the persisted task list.
    pub async fn get_tasks(&mut self) -> Result<Vec<Task>> {
        match self.request(MessageType::GetTasks).await? {
            DaemonMessage::Tasks { tasks } => Ok(tasks),
            other => Err(unexpected("tasks", &other)),
        }
    }

    /// Persists the task list wholesale.
    pub async fn save_tasks(&mut self, tasks: Vec<Task>) -> Result<()> {
        match self.request(MessageType::SaveTasks { tasks }).await? {
            DaemonMessage::Ack => Ok(()),
            other => Err(unexpected("ack", &other)),
        }
    }

    /// Starts the countdown.
    pub async fn timer_start(&mut self) -> Result<()> {
        match self.request(MessageType::TimerStart).await? {
            DaemonMessage::Ack => Ok(()),
            other => Err(unexpected("ack", &other)),
        }
    }

    /// Pauses the countdown.
    pub async fn timer_pause(&mut self) -> Result<()> {
        match self.request(MessageType::TimerPause).await? {
            DaemonMessage::Ack => Ok(()),
            other => Err(unexpected("ack", &other)),
        }
    }

    /// Resets the countdown.
    pub async fn timer_reset(&mut self) -> Result<()> {
        match self.request(MessageType::TimerReset).await? {
            DaemonMessage::Ack => Ok(()),
            other => Err(unexpected("ack", &other)),
        }
    }

    /// Fetches a live timer snapshot.
    pub async fn timer_get_state(&mut self) -> Result<TimerState> {
        match self.request(MessageType::TimerGetState).await? {
            DaemonMessage::TimerState { state } => Ok(state),
            other => Err(unexpected("timer state", &other)),
        }
    }

    /// Subscribes to tick and completion broadcasts.
    ///
    /// Returns the initial sync snapshot; subsequent events arrive via
    /// [`Connection::next_message`].
    pub async fn subscribe(&mut self) -> Result<TimerState> {
        match self.request(MessageType::Subscribe).await? {
            DaemonMessage::TimerState { state } => Ok(state),
            other => Err(unexpected("timer state sync", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &DaemonMessage) -> CliError {
    CliError::Protocol(format!("expected {wanted}, got {got:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_defaults() {
        // POMO_SOCKET unset in the test environment falls back to the
        // default path
        if env::var("POMO_SOCKET").is_err() {
            let client = DaemonClient::from_env();
            assert_eq!(client.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        }
    }

    #[tokio::test]
    async fn test_connect_fails_without_daemon() {
        let client = DaemonClient::new("/tmp/definitely-not-a-pomod.sock");
        let result = client.connect().await;
        assert!(matches!(result, Err(CliError::Connect { .. })));
    }
}
