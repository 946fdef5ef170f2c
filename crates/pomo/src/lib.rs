//! Pomo CLI - Library modules
//!
//! This library provides the client-side pieces of the pomo CLI:
//! a line-protocol connection to the pomod daemon and the error type
//! shared by the commands.
//!
//! The CLI is a view in the coordinator's sense: it issues commands,
//! reads snapshots, and (in watch mode) subscribes to the tick and
//! completion stream, folding completions into the persisted stats the
//! way a window would.

pub mod client;
pub mod error;

pub use client::{Connection, DaemonClient};
pub use error::{CliError, Result};
