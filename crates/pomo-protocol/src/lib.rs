//! Pomo Protocol - Wire protocol for daemon communication
//!
//! This crate provides the message types exchanged between view clients
//! and the pomod daemon: the command surface (settings, stats, tasks,
//! timer-state persistence, timer controls) and the event stream
//! (tick and completion broadcasts).
//!
//! Messages travel as newline-delimited JSON over a Unix socket. Every
//! client message carries a protocol version; the daemon rejects
//! connections whose major version differs from its own.

pub mod message;
pub mod version;

pub use message::{ClientMessage, DaemonMessage, MessageType};
pub use version::ProtocolVersion;
