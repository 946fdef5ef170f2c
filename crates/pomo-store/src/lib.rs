//! Pomo Store - Durable persistence for the pomodoro timer
//!
//! A single JSON document holds the four record kinds under fixed keys:
//! `settings`, `stats`, `tasks`, and `timer_state`. Defaults are applied
//! on first read, every record round-trips through validation on both
//! read and write, and writes are atomic (write-then-rename).
//!
//! [`TimerStore::open`] is the single initialization gate: it loads the
//! document, runs the one-time task-id migration, and only then can the
//! store be handed to consumers - access-before-initialization is
//! impossible by construction.

mod error;
mod migration;
mod store;

pub use error::{MigrationError, StoreError};
pub use migration::MigrationReport;
pub use store::TimerStore;
