//! Pomo Daemon - Timer engine and broadcast server
//!
//! This crate provides the core infrastructure for the pomod daemon:
//! - `timer` - The authoritative countdown engine (actor pattern)
//! - `server` - Unix socket server for view clients
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     pomod daemon                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │  DaemonServer   │────▶│       TimerEngine           │    │
//! │  │ (Unix Socket)   │     │  (countdown state owner)    │    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │                             │                   │
//! │           │ connections                 │ tick/complete     │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │ConnectionHandler│     │    broadcast::Sender        │    │
//! │  │  (per client)   │     │   (event distribution)      │    │
//! │  └────────┬────────┘     └─────────────────────────────┘    │
//! │           │                                                 │
//! │           ▼                                                 │
//! │  ┌─────────────────┐                                        │
//! │  │   TimerStore    │  settings / stats / tasks /            │
//! │  │  (JSON on disk) │  timer-state snapshots                 │
//! │  └─────────────────┘                                        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine owns the only live `TimerState` in the process and is the
//! sole writer. Commands and the 1-second clock are serviced by the
//! same actor task, so a tick can never interleave with a command.
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod server;
pub mod timer;
