//! Pomo Core - Shared domain types for the pomodoro timer
//!
//! This crate provides the record kinds shared between the daemon (pomod),
//! the store, and client views: timer settings, the live timer state,
//! tasks, and cumulative stats.
//!
//! Every type that crosses a process or persistence boundary implements
//! [`Validate`]: data either normalizes to a valid value or yields a
//! structured [`ValidationError`], never a partially-trusted record.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod settings;
pub mod state;
pub mod stats;
pub mod task;

// Re-exports for convenience
pub use error::{Validate, ValidationError};
pub use settings::TimerSettings;
pub use state::{BreakKind, TimerState};
pub use stats::TimerStats;
pub use task::{Task, TaskId};
