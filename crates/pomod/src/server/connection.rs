//! Per-client connection handling.
//!
//! Every accepted socket gets its own `ConnectionHandler`: it negotiates
//! the protocol version, parses incoming lines, routes timer commands to
//! the engine and record commands to the store, and registers the client
//! as an event subscriber on request.
//!
//! Validation failures and store errors fail the specific request with
//! an `error` response; they never tear down the connection and never
//! reach the engine or the disk.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use pomo_core::TimerStats;
use pomo_protocol::{ClientMessage, DaemonMessage, MessageType, ProtocolVersion};
use pomo_store::TimerStore;

use crate::timer::{TimerError, TimerHandle};

/// Shared write half of a subscribed client's socket.
pub type SubscriberWriter = Arc<Mutex<BufWriter<OwnedWriteHalf>>>;

/// Registry of subscriber writers, keyed by client id.
pub type SubscribersMap = Arc<RwLock<HashMap<String, SubscriberWriter>>>;

/// Maximum number of concurrent subscribed clients.
///
/// In practice a couple of views are attached; the registry does not
/// assume a fixed count, only a sane upper bound.
const MAX_SUBSCRIBERS: usize = 16;

/// Largest accepted request line, in bytes.
const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Idle-connection read deadline.
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Per-response write deadline.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Daemon-assigned identity of a connected client.
type ClientId = String;

/// Handles one client from handshake to disconnect.
pub struct ConnectionHandler {
    /// Buffered read half of the socket
    reader: BufReader<OwnedReadHalf>,

    /// Write half, shared with the broadcaster while subscribed
    writer: SubscriberWriter,

    /// Handle to the timer engine
    timer: TimerHandle,

    /// The durable store
    store: Arc<TimerStore>,

    /// Registry this client joins on subscribe
    subscribers: SubscribersMap,

    /// Assigned during the handshake
    client_id: Option<ClientId>,

    /// Fallback client-id source for anonymous connects
    connection_number: u64,
}

impl ConnectionHandler {
    /// Wraps an accepted socket in a handler.
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        timer: TimerHandle,
        store: Arc<TimerStore>,
        subscribers: SubscribersMap,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: Arc::new(Mutex::new(BufWriter::new(writer))),
            timer,
            store,
            subscribers,
            client_id: None,
            connection_number,
        }
    }

    /// Drives the connection: handshake, then the message loop.
    ///
    /// Returns the client id (if the handshake completed) so the server
    /// can deregister the client from the subscriber registry.
    pub async fn run(mut self) -> Option<ClientId> {
        debug!(connection = self.connection_number, "new client connected");

        match self.handle_handshake().await {
            Ok(()) => {
                info!(client_id = ?self.client_id, "client handshake completed");
            }
            Err(e) => {
                warn!(
                    connection = self.connection_number,
                    error = %e,
                    "handshake failed"
                );
                return None;
            }
        }

        let client_id = self.client_id.clone();

        if let Err(e) = self.process_messages().await {
            debug!(
                client_id = ?self.client_id,
                error = %e,
                "connection closed"
            );
        }

        info!(client_id = ?self.client_id, "client disconnected");
        client_id
    }

    /// Performs the handshake.
    ///
    /// The first message must be `connect` with a compatible protocol
    /// version; the reply is `connected` (carrying the assigned client
    /// id) or `rejected`.
    async fn handle_handshake(&mut self) -> Result<(), ConnectionError> {
        let msg = self.read_message().await?;

        let client_version = msg.protocol_version;
        if !client_version.is_compatible_with(&ProtocolVersion::CURRENT) {
            warn!(
                client_version = %client_version,
                server_version = %ProtocolVersion::CURRENT,
                "protocol version mismatch"
            );

            self.send_message(DaemonMessage::rejected(&format!(
                "protocol version {} not compatible with server version {}",
                client_version,
                ProtocolVersion::CURRENT
            )))
            .await?;

            return Err(ConnectionError::VersionMismatch {
                client: client_version,
                server: ProtocolVersion::CURRENT,
            });
        }

        match msg.message {
            MessageType::Connect { client_id } => {
                let assigned_id =
                    client_id.unwrap_or_else(|| format!("client-{}", self.connection_number));

                self.client_id = Some(assigned_id.clone());

                self.send_message(DaemonMessage::connected(assigned_id))
                    .await?;

                Ok(())
            }
            other => {
                self.send_message(DaemonMessage::error(
                    "expected connect message for handshake",
                ))
                .await?;

                Err(ConnectionError::UnexpectedMessage(format!("{other:?}")))
            }
        }
    }

    /// Services requests until the client goes away.
    ///
    /// A handler error fails that request with an error response and
    /// the loop continues; only I/O faults and the idle deadline end
    /// the connection.
    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
                Ok(Ok(msg)) => msg,
                Ok(Err(ConnectionError::Eof)) => {
                    debug!(client_id = ?self.client_id, "client sent EOF");
                    return Ok(());
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    debug!(client_id = ?self.client_id, "connection timed out");
                    return Err(ConnectionError::Timeout);
                }
            };

            match self.handle_message(msg).await {
                Ok(()) => {}
                // Graceful disconnect ends the loop without a response
                Err(ConnectionError::Eof) => return Ok(()),
                Err(e) => {
                    debug!(
                        client_id = ?self.client_id,
                        error = %e,
                        "request failed"
                    );

                    // Fail the request, keep the connection
                    let _ = self
                        .send_message(DaemonMessage::error(&e.to_string()))
                        .await;
                }
            }
        }
    }

    /// Handles a single client message.
    async fn handle_message(&mut self, msg: ClientMessage) -> Result<(), ConnectionError> {
        match msg.message {
            MessageType::Connect { .. } => {
                self.send_message(DaemonMessage::error("already connected"))
                    .await?;
            }

            // ----------------------------------------------------------------
            // Record commands (store)
            // ----------------------------------------------------------------
            MessageType::GetSettings => {
                let settings = self.store.settings().await.map_err(ConnectionError::store)?;
                self.send_message(DaemonMessage::settings(settings)).await?;
            }

            MessageType::SaveSettings { settings } => {
                // Persist first; only a validated, stored record is
                // pushed into the engine.
                self.store
                    .save_settings(&settings)
                    .await
                    .map_err(ConnectionError::store)?;
                self.timer
                    .update_settings(settings)
                    .await
                    .map_err(ConnectionError::timer)?;
                self.send_message(DaemonMessage::Ack).await?;
            }

            MessageType::GetStats => {
                let stats = self.store.stats().await.map_err(ConnectionError::store)?;
                self.send_message(DaemonMessage::stats(stats)).await?;
            }

            MessageType::SaveStats { stats } => {
                self.store
                    .save_stats(&stats)
                    .await
                    .map_err(ConnectionError::store)?;
                self.send_message(DaemonMessage::Ack).await?;
            }

            MessageType::ResetStats => {
                self.store
                    .save_stats(&TimerStats::fresh(Utc::now()))
                    .await
                    .map_err(ConnectionError::store)?;
                self.send_message(DaemonMessage::Ack).await?;
            }

            MessageType::GetTasks => {
                let tasks = self.store.tasks().await.map_err(ConnectionError::store)?;
                self.send_message(DaemonMessage::tasks(tasks)).await?;
            }

            MessageType::SaveTasks { tasks } => {
                self.store
                    .save_tasks(&tasks)
                    .await
                    .map_err(ConnectionError::store)?;
                self.send_message(DaemonMessage::Ack).await?;
            }

            MessageType::GetTimerState => {
                let state = self
                    .store
                    .timer_state()
                    .await
                    .map_err(ConnectionError::store)?;
                self.send_message(DaemonMessage::timer_state(state)).await?;
            }

            MessageType::SaveTimerState { state } => {
                self.store
                    .save_timer_state(&state)
                    .await
                    .map_err(ConnectionError::store)?;
                self.send_message(DaemonMessage::Ack).await?;
            }

            // ----------------------------------------------------------------
            // Timer commands (engine)
            // ----------------------------------------------------------------
            MessageType::TimerStart => {
                self.timer.start().await.map_err(ConnectionError::timer)?;
                self.send_message(DaemonMessage::Ack).await?;
            }

            MessageType::TimerPause => {
                self.timer.pause().await.map_err(ConnectionError::timer)?;
                self.send_message(DaemonMessage::Ack).await?;
            }

            MessageType::TimerReset => {
                self.timer.reset().await.map_err(ConnectionError::timer)?;
                self.send_message(DaemonMessage::Ack).await?;
            }

            MessageType::TimerGetState => {
                let state = self
                    .timer
                    .get_state()
                    .await
                    .map_err(ConnectionError::timer)?;
                self.send_message(DaemonMessage::timer_state(state)).await?;
            }

            // ----------------------------------------------------------------
            // Subscription
            // ----------------------------------------------------------------
            MessageType::Subscribe => {
                let client_id = match &self.client_id {
                    Some(id) => id.clone(),
                    None => {
                        self.send_message(DaemonMessage::error(
                            "must connect before subscribing",
                        ))
                        .await?;
                        return Ok(());
                    }
                };

                {
                    let mut subs = self.subscribers.write().await;

                    if subs.len() >= MAX_SUBSCRIBERS && !subs.contains_key(&client_id) {
                        self.send_message(DaemonMessage::error(&format!(
                            "too many subscribers (max: {MAX_SUBSCRIBERS})"
                        )))
                        .await?;
                        return Ok(());
                    }

                    subs.insert(client_id.clone(), Arc::clone(&self.writer));
                }

                debug!(client_id = %client_id, "client subscribed to timer events");

                // Late joiners sync immediately from the live snapshot
                let state = self
                    .timer
                    .get_state()
                    .await
                    .map_err(ConnectionError::timer)?;
                self.send_message(DaemonMessage::timer_state(state)).await?;
            }

            MessageType::Unsubscribe => {
                if let Some(ref client_id) = self.client_id {
                    let mut subs = self.subscribers.write().await;
                    subs.remove(client_id);
                }

                debug!(
                    client_id = ?self.client_id,
                    "client unsubscribed from timer events"
                );

                self.send_message(DaemonMessage::Ack).await?;
            }

            // ----------------------------------------------------------------
            // Connection management
            // ----------------------------------------------------------------
            MessageType::Ping { seq } => {
                self.send_message(DaemonMessage::pong(seq)).await?;
            }

            MessageType::Disconnect => {
                debug!(client_id = ?self.client_id, "client requested disconnect");
                return Err(ConnectionError::Eof);
            }
        }

        Ok(())
    }

    /// Reads and parses one request line.
    async fn read_message(&mut self) -> Result<ClientMessage, ConnectionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let msg: ClientMessage = serde_json::from_str(&line)
            .map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        debug!(
            client_id = ?self.client_id,
            message_type = ?std::mem::discriminant(&msg.message),
            "received message"
        );

        Ok(msg)
    }

    /// Writes one response line, bounded by the write deadline.
    async fn send_message(&self, msg: DaemonMessage) -> Result<(), ConnectionError> {
        let json =
            serde_json::to_string(&msg).map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        let mut writer = self.writer.lock().await;

        match timeout(WRITE_TIMEOUT, async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("protocol version mismatch: client {client}, server {server}")]
    VersionMismatch {
        client: ProtocolVersion,
        server: ProtocolVersion,
    },

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("connection closed")]
    Eof,

    #[error("read timeout")]
    Timeout,

    #[error("write timeout")]
    WriteTimeout,

    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("store error: {0}")]
    Store(String),

    #[error("timer error: {0}")]
    Timer(String),
}

impl ConnectionError {
    fn store(err: pomo_store::StoreError) -> Self {
        Self::Store(err.to_string())
    }

    fn timer(err: TimerError) -> Self {
        Self::Timer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::VersionMismatch {
            client: ProtocolVersion::new(2, 0),
            server: ProtocolVersion::new(1, 0),
        };
        assert!(err.to_string().contains("2.0"));
        assert!(err.to_string().contains("1.0"));
    }

    #[test]
    fn test_message_size_error() {
        let err = ConnectionError::MessageTooLarge {
            size: 2_000_000,
            max: MAX_MESSAGE_SIZE,
        };
        assert!(err.to_string().contains("2000000"));
    }

    #[test]
    fn test_store_error_mapping() {
        let err = ConnectionError::store(pomo_store::StoreError::Corrupt("bad".to_string()));
        assert!(matches!(err, ConnectionError::Store(_)));
        assert!(err.to_string().contains("bad"));
    }
}
