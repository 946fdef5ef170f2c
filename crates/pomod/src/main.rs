//! Pomo Daemon - Authoritative pomodoro timer
//!
//! This binary runs as a background daemon. It owns the countdown,
//! advances it on a fixed 1-second cadence independent of any view,
//! persists settings/stats/tasks durably, and broadcasts state to
//! however many view clients happen to be attached.
//!
//! ```bash
//! pomod start         # run in the foreground
//! pomod start -d      # fork to the background
//! pomod stop          # SIGTERM the running daemon
//! pomod status        # report pid and socket
//!
//! POMO_SOCKET=/run/pomod.sock pomod start   # custom socket path
//! POMO_DATA_DIR=~/.pomo pomod start         # custom store location
//! RUST_LOG=pomod=debug pomod start          # verbose logging
//! ```
//!
//! SIGTERM and SIGINT both trigger a graceful shutdown.

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pomo_store::TimerStore;
use pomod::server::{DaemonServer, DEFAULT_SOCKET_PATH};
use pomod::timer::spawn_timer;

/// Pomo daemon - authoritative pomodoro timer
#[derive(Parser, Debug)]
#[command(name = "pomod", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

/// Returns the state directory for PID and log files.
fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pomo")
}

fn pid_file_path() -> PathBuf {
    state_dir().join("pomod.pid")
}

fn log_file_path() -> PathBuf {
    state_dir().join("pomod.log")
}

/// Returns the store file location, honoring `POMO_DATA_DIR`.
fn store_file_path() -> PathBuf {
    let data_dir = env::var("POMO_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("pomo")
    });
    data_dir.join("store.json")
}

/// Reads the recorded daemon PID, if a PID file exists.
fn read_pid() -> Option<u32> {
    let contents = fs::read_to_string(pid_file_path()).ok()?;
    contents.trim().parse().ok()
}

/// Records this process's PID for `stop`/`status`.
fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

/// Checks if the daemon is already running.
///
/// A single daemon instance owns the authoritative timer; a second
/// `start` is refused rather than spawning a competing countdown.
fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        // stale PID file from an unclean exit
        remove_pid_file();
    }
    None
}

/// Asks the running daemon to shut down via SIGTERM.
fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {pid}");
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Default to 'start' if no subcommand given
    let command = args.command.unwrap_or(Command::Start { daemon: false });

    match command {
        Command::Start { daemon } => {
            if let Some(pid) = is_daemon_running() {
                eprintln!("Daemon is already running (PID {pid})");
                eprintln!("Use 'pomod stop' to stop it first.");
                process::exit(1);
            }

            if daemon {
                // Daemonize before starting the tokio runtime
                daemonize()?;
            }

            write_pid()?;

            let result = run_daemon();

            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping daemon (PID {pid})...");
                stop_daemon(pid)?;

                // give it up to five seconds to wind down
                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Daemon stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Daemon did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Daemon is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Daemon is running (PID {pid})");

                let socket_path = env::var("POMO_SOCKET")
                    .unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string());
                if PathBuf::from(&socket_path).exists() {
                    println!("Socket: {socket_path}");
                }

                Ok(())
            } else {
                println!("Daemon is not running.");
                process::exit(1);
            }
        }
    }
}

/// Daemonizes the current process.
fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = File::create(&log_path).context("Failed to create log file for stderr")?;

    let daemonize = Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr);

    daemonize.start().context("Failed to daemonize")?;

    Ok(())
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pomod=info".parse()?)
                .add_directive("pomo_core=info".parse()?)
                .add_directive("pomo_store=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "pomod starting"
    );

    let socket_path = env::var("POMO_SOCKET").unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string());

    // Open the store first: the migration pass runs inside open(),
    // before any command handling can observe legacy data.
    let store_path = store_file_path();
    let store = Arc::new(
        TimerStore::open(&store_path)
            .with_context(|| format!("Failed to open store at {}", store_path.display()))?,
    );

    // Settings feed the engine once at startup; later updates arrive
    // through the save-settings command.
    let settings = store
        .settings()
        .await
        .context("Stored settings failed validation")?;

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "error waiting for shutdown signal");
        }
        info!("shutdown signal received");
        shutdown_token.cancel();
    });

    let timer = spawn_timer(settings);
    info!("timer engine started");

    let server = DaemonServer::new(&socket_path, timer, store, cancel_token);

    info!(socket = %socket_path, "starting server");

    if let Err(e) = server.run().await {
        error!(error = %e, "server error");
        return Err(e.into());
    }

    info!("pomod stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("received Ctrl+C");
    }

    Ok(())
}
