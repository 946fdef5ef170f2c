//! Unix socket server for the pomod daemon.
//!
//! The server accepts view-client connections, hands each one to its
//! own [`ConnectionHandler`] task, and runs a broadcaster task that
//! fans timer-engine events out to every subscribed client. Shutdown
//! is cooperative: cancelling the token stops the accept loop and the
//! broadcaster, and removes the socket file.
//!
//! The subscriber registry is the observer side of the coordinator:
//! views register by subscribing, deregister by unsubscribing or
//! disconnecting, and a view that vanishes mid-broadcast is dropped
//! from the registry on its first failed write. Nothing in the
//! registry keeps a connection alive.
//!
//! All code here follows the panic-free policy; a fault on one
//! connection is logged and never takes the server down.

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, SubscriberWriter, SubscribersMap};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixListener;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pomo_protocol::DaemonMessage;
use pomo_store::TimerStore;

use crate::timer::{TimerEvent, TimerHandle};

/// Socket path used when `POMO_SOCKET` is not set.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/pomod.sock";

/// Unix socket server for the pomod daemon.
///
/// Manages client connections and event broadcasting. The subscriber
/// registry holds non-owning writer handles only; a destination that
/// goes away is removed on its first failed write and never keeps the
/// underlying connection alive.
pub struct DaemonServer {
    /// Where the listening socket is created
    socket_path: PathBuf,

    /// Handle to the timer engine
    timer: TimerHandle,

    /// The durable store (already opened and migrated)
    store: Arc<TimerStore>,

    /// Cooperative shutdown signal
    cancel_token: CancellationToken,

    /// Source of fallback client ids
    connection_counter: AtomicU64,

    /// Currently subscribed clients
    subscribers: SubscribersMap,
}

impl DaemonServer {
    /// Assembles a server over an opened store and a spawned engine.
    pub fn new(
        socket_path: impl Into<PathBuf>,
        timer: TimerHandle,
        store: Arc<TimerStore>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            timer,
            store,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Returns the number of active subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Runs the accept loop until the cancellation token fires.
    pub async fn run(&self) -> Result<(), ServerError> {
        // A leftover socket from an unclean exit would fail the bind
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| ServerError::SocketSetup {
                path: self.socket_path.clone(),
                error: e.to_string(),
            })?;
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ServerError::SocketSetup {
                    path: self.socket_path.clone(),
                    error: e.to_string(),
                })?;
            }
        }

        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| ServerError::SocketSetup {
                path: self.socket_path.clone(),
                error: e.to_string(),
            })?;

        info!(
            socket = %self.socket_path.display(),
            "daemon server listening"
        );

        self.spawn_event_broadcaster();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            // One bad accept does not stop the listener
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    /// Hands an accepted stream to its own handler task.
    fn handle_connection(&self, stream: tokio::net::UnixStream, connection_number: u64) {
        let (reader, writer) = stream.into_split();
        let timer = self.timer.clone();
        let store = Arc::clone(&self.store);
        let subscribers = Arc::clone(&self.subscribers);

        tokio::spawn(async move {
            let handler = ConnectionHandler::new(
                reader,
                writer,
                timer,
                store,
                Arc::clone(&subscribers),
                connection_number,
            );

            let client_id = handler.run().await;

            // A client that vanished while subscribed is deregistered here
            if let Some(id) = client_id {
                let mut subs = subscribers.write().await;
                if subs.remove(&id).is_some() {
                    debug!(client_id = %id, "removed disconnected subscriber");
                }
            }
        });
    }

    /// Spawns the task that fans engine events out to subscribers.
    fn spawn_event_broadcaster(&self) {
        let mut event_rx = self.timer.subscribe();
        let subscribers = Arc::clone(&self.subscribers);
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("event broadcaster shutting down");
                        break;
                    }

                    result = event_rx.recv() => {
                        match result {
                            Ok(event) => {
                                broadcast_event(&subscribers, &event).await;
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "event broadcaster lagged, skipped events");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                debug!("timer event channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    /// Clears the registry and removes the socket file on shutdown.
    async fn cleanup(&self) {
        {
            let mut subs = self.subscribers.write().await;
            subs.clear();
        }

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "failed to remove socket file"
                );
            }
        }

        info!("server cleanup complete");
    }
}

/// Fans a timer event out to all subscribed clients.
///
/// Destinations that fail to accept the write are silently removed;
/// a missing or slow destination never blocks the others.
async fn broadcast_event(subscribers: &SubscribersMap, event: &TimerEvent) {
    let msg = match event {
        TimerEvent::Tick { state } => DaemonMessage::timer_tick(state.clone()),
        TimerEvent::Complete {
            was_break,
            completed_pomodoros,
        } => DaemonMessage::timer_complete(*was_break, *completed_pomodoros),
    };

    let json = match serde_json::to_string(&msg) {
        Ok(j) => j,
        Err(e) => {
            error!(error = %e, "failed to serialize timer event");
            return;
        }
    };

    let subs = subscribers.read().await;
    let mut failed_clients = Vec::new();

    for (client_id, writer) in subs.iter() {
        let mut writer = writer.lock().await;
        let send_result = async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = send_result {
            debug!(
                client_id = %client_id,
                error = %e,
                "failed to send event to subscriber"
            );
            failed_clients.push(client_id.clone());
        }
    }

    // Removal needs the write lock, so the read lock goes first
    drop(subs);

    if !failed_clients.is_empty() {
        let mut subs = subscribers.write().await;
        for client_id in failed_clients {
            subs.remove(&client_id);
            debug!(client_id = %client_id, "removed failed subscriber");
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to setup socket at {path}: {error}")]
    SocketSetup { path: PathBuf, error: String },

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_socket_path() {
        assert_eq!(DEFAULT_SOCKET_PATH, "/tmp/pomod.sock");
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::SocketSetup {
            path: PathBuf::from("/tmp/test.sock"),
            error: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("/tmp/test.sock"));
        assert!(err.to_string().contains("permission denied"));
    }
}
