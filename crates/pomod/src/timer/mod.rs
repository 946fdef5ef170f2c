//! Timer engine using the actor pattern.
//!
//! The engine is the single owner of the live countdown state. It
//! receives commands via a tokio mpsc channel, drives the 1-second
//! clock from the same task, and publishes state snapshots and
//! completion events over a broadcast channel.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  View Clients   │────▶│   TimerEngine   │────▶│ Broadcast Channel│
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                       │
//!         │   TimerCommand        │   TimerEvent          │
//!         │   (mpsc channel)      │   (broadcast)         │
//!         ▼                       ▼                       ▼
//!    start/pause/reset       TimerState +            All subscribed
//!    get-state/settings      Option<Interval>        views receive
//! ```

use tokio::sync::{broadcast, mpsc};

mod commands;
mod engine;
mod handle;

pub use commands::{TimerCommand, TimerError, TimerEvent};
pub use engine::TimerEngine;
pub use handle::TimerHandle;

use pomo_core::TimerSettings;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

/// Spawn the timer engine and return a handle for interaction.
///
/// Creates the command and event channels, spawns the engine on a
/// tokio task, and returns a cheap-to-clone [`TimerHandle`]. The
/// engine stops when every handle has been dropped.
///
/// `settings` must already be validated; the daemon loads them through
/// the store, which refuses invalid records.
pub fn spawn_timer(settings: TimerSettings) -> TimerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let engine = TimerEngine::new(settings, cmd_rx, event_tx.clone());
    tokio::spawn(engine.run());

    TimerHandle::new(cmd_tx, event_tx)
}
