//! The engine's public face.
//!
//! `TimerHandle` wraps the command and event channels behind async
//! methods; anything in the daemon that needs the timer holds a clone
//! of it. A closed channel (engine gone) surfaces as
//! `TimerError::ChannelClosed` from every method.

use tokio::sync::{broadcast, mpsc, oneshot};

use pomo_core::{TimerSettings, TimerState};

use super::commands::{TimerCommand, TimerError, TimerEvent};

/// Cheap-to-clone handle onto the timer engine.
///
/// ```ignore
/// let timer = spawn_timer(settings);
///
/// timer.start().await?;
/// let state = timer.get_state().await?;
///
/// let mut events = timer.subscribe();
/// while let Ok(event) = events.recv().await {
///     // render the snapshot / fold the completion
/// }
/// ```
#[derive(Clone)]
pub struct TimerHandle {
    /// Command channel into the engine
    sender: mpsc::Sender<TimerCommand>,

    /// Event channel out of the engine
    event_sender: broadcast::Sender<TimerEvent>,
}

impl TimerHandle {
    /// Builds a handle from the engine's channel ends.
    pub fn new(
        sender: mpsc::Sender<TimerCommand>,
        event_sender: broadcast::Sender<TimerEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Starts the countdown.
    ///
    /// A no-op if the timer is already running or the segment has
    /// elapsed; those cases are deliberately not errors.
    ///
    /// # Errors
    ///
    /// - `TimerError::ChannelClosed` if the engine has shut down
    pub async fn start(&self) -> Result<(), TimerError> {
        self.ack_command(|respond_to| TimerCommand::Start { respond_to })
            .await
    }

    /// Pauses the countdown. Idempotent.
    ///
    /// # Errors
    ///
    /// - `TimerError::ChannelClosed` if the engine has shut down
    pub async fn pause(&self) -> Result<(), TimerError> {
        self.ack_command(|respond_to| TimerCommand::Pause { respond_to })
            .await
    }

    /// Resets to a fresh, paused work segment. Idempotent.
    ///
    /// # Errors
    ///
    /// - `TimerError::ChannelClosed` if the engine has shut down
    pub async fn reset(&self) -> Result<(), TimerError> {
        self.ack_command(|respond_to| TimerCommand::Reset { respond_to })
            .await
    }

    /// Replaces the engine's settings wholesale.
    ///
    /// The caller is responsible for validating the settings first;
    /// handlers validate at the boundary before calling this.
    ///
    /// # Errors
    ///
    /// - `TimerError::ChannelClosed` if the engine has shut down
    pub async fn update_settings(&self, settings: TimerSettings) -> Result<(), TimerError> {
        self.ack_command(|respond_to| TimerCommand::UpdateSettings {
            settings,
            respond_to,
        })
        .await
    }

    /// Gets a snapshot of the current timer state.
    ///
    /// # Errors
    ///
    /// - `TimerError::ChannelClosed` if the engine has shut down
    pub async fn get_state(&self) -> Result<TimerState, TimerError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(TimerCommand::GetState { respond_to: tx })
            .await
            .map_err(|_| TimerError::ChannelClosed)?;

        rx.await.map_err(|_| TimerError::ChannelClosed)
    }

    /// Subscribes to timer events.
    ///
    /// Returns a broadcast receiver that will receive every state
    /// snapshot and completion event published by the engine. Dropping
    /// the receiver deregisters the subscriber.
    ///
    /// This is a synchronous operation - it doesn't communicate with
    /// the engine.
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.event_sender.subscribe()
    }

    /// Checks if the engine is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Sends a fire-and-acknowledge command.
    async fn ack_command<F>(&self, make: F) -> Result<(), TimerError>
    where
        F: FnOnce(oneshot::Sender<()>) -> TimerCommand,
    {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(make(tx))
            .await
            .map_err(|_| TimerError::ChannelClosed)?;

        rx.await.map_err(|_| TimerError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_handle() -> (TimerHandle, mpsc::Receiver<TimerCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = broadcast::channel(16);
        let handle = TimerHandle::new(cmd_tx, event_tx);
        (handle, cmd_rx)
    }

    #[tokio::test]
    async fn test_start_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(TimerCommand::Start { respond_to }) = rx.recv().await {
                let _ = respond_to.send(());
                return true;
            }
            false
        });

        let result = handle.start().await;
        assert!(result.is_ok());
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_get_state_roundtrip() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(TimerCommand::GetState { respond_to }) = rx.recv().await {
                let _ = respond_to.send(TimerState::default());
                return true;
            }
            false
        });

        let state = handle.get_state().await.unwrap();
        assert_eq!(state, TimerState::default());
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(matches!(
            handle.start().await,
            Err(TimerError::ChannelClosed)
        ));
        assert!(matches!(
            handle.get_state().await,
            Err(TimerError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_update_settings_carries_payload() {
        let (handle, mut rx) = create_test_handle();

        let mut settings = TimerSettings::default();
        settings.work_duration = 45;
        let expected = settings.clone();

        let cmd_handler = tokio::spawn(async move {
            if let Some(TimerCommand::UpdateSettings {
                settings,
                respond_to,
            }) = rx.recv().await
            {
                assert_eq!(settings, expected);
                let _ = respond_to.send(());
                return true;
            }
            false
        });

        let result = handle.update_settings(settings).await;
        assert!(result.is_ok());
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_subscribe_returns_receiver() {
        let (handle, _rx) = create_test_handle();
        let _subscriber = handle.subscribe();
    }

    #[tokio::test]
    async fn test_handle_is_clone() {
        let (handle, _rx) = create_test_handle();
        let _cloned = handle.clone();
    }
}
