//! Pomo CLI - control and watch the pomod pomodoro timer
//!
//! # Usage
//!
//! ```text
//! pomo status                   # one-line snapshot of the live timer
//! pomo start | pause | reset    # drive the countdown
//! pomo watch                    # follow ticks and completions live
//! pomo settings show
//! pomo settings set --work 50 --auto-start-breaks true
//! pomo tasks list
//! pomo tasks add "Write the report" --estimate 3
//! pomo tasks done <id>
//! pomo stats show | reset
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pomo::client::DaemonClient;
use pomo::Connection;
use pomo_core::{Task, TimerState, TimerStats};
use pomo_protocol::DaemonMessage;

// ============================================================================
// CLI Arguments
// ============================================================================

/// Pomo CLI - pomodoro timer client
#[derive(Parser, Debug)]
#[command(name = "pomo")]
#[command(about = "Control and watch the pomod pomodoro timer")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a one-line snapshot of the live timer
    Status,
    /// Start the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Reset to a fresh work segment
    Reset,
    /// Follow ticks and completions live
    Watch,
    /// Show or change the timer settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Manage the task list
    Tasks {
        #[command(subcommand)]
        command: TasksCommand,
    },
    /// Show or reset the cumulative stats
    Stats {
        #[command(subcommand)]
        command: StatsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Change one or more settings (unspecified fields keep their value)
    Set {
        /// Work segment length in minutes
        #[arg(long)]
        work: Option<u32>,
        /// Short break length in minutes
        #[arg(long)]
        short_break: Option<u32>,
        /// Long break length in minutes
        #[arg(long)]
        long_break: Option<u32>,
        /// Work segments per long break
        #[arg(long)]
        interval: Option<u32>,
        /// Start breaks automatically
        #[arg(long)]
        auto_start_breaks: Option<bool>,
        /// Start work segments automatically
        #[arg(long)]
        auto_start_pomodoros: Option<bool>,
        /// Completion sound in views
        #[arg(long)]
        sound: Option<bool>,
    },
}

#[derive(Subcommand, Debug)]
enum TasksCommand {
    /// List tasks
    List,
    /// Add a task
    Add {
        /// Task title
        title: String,
        /// Estimated pomodoros
        #[arg(long, default_value_t = 1)]
        estimate: u32,
    },
    /// Mark a task done (accepts an id prefix)
    Done {
        /// Task id, or an unambiguous prefix of one
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum StatsCommand {
    /// Print the counters
    Show,
    /// Zero the counters
    Reset,
}

// ============================================================================
// Formatting
// ============================================================================

/// Renders seconds as m:ss.
fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Renders a state snapshot as a one-line summary.
fn format_state(state: &TimerState) -> String {
    let mode = if state.is_break { "break" } else { "work" };
    let run = if state.is_running { "running" } else { "paused" };
    let mut line = format!(
        "{mode} {} {run} \u{00b7} {} pomodoros",
        format_clock(state.time_left),
        state.completed_pomodoros
    );
    if let Some(task_id) = &state.current_task_id {
        line.push_str(&format!(" \u{00b7} task {}", task_id.short()));
    }
    line
}

fn print_stats(stats: &TimerStats) {
    println!("pomodoros:       {}", stats.total_pomodoros);
    println!("focus minutes:   {}", stats.total_focus_time);
    println!("break minutes:   {}", stats.total_break_time);
    println!("completed tasks: {}", stats.total_completed_tasks);
    match &stats.last_reset_date {
        Some(when) => println!("last reset:      {when}"),
        None => println!("last reset:      never"),
    }
}

// ============================================================================
// Watch Mode
// ============================================================================

/// Follows the broadcast stream, printing ticks and folding completion
/// events into the persisted stats - the same bookkeeping a window view
/// performs.
async fn watch(mut conn: Connection) -> Result<()> {
    // Settings and stats are read up front: once subscribed, broadcasts
    // interleave with responses, so the watch loop never issues paired
    // request/response calls - saves go out fire-and-forget.
    let settings = conn.get_settings().await?;
    let mut stats = conn.get_stats().await?;

    let initial = conn.subscribe().await?;
    println!("{}", format_state(&initial));

    // The completion event does not say which break kind finished, so
    // the view remembers the length of the break it watched begin.
    let mut last_break_secs: u32 = settings.short_break_secs();
    let mut was_break = initial.is_break;
    let mut pending_acks: u32 = 0;

    loop {
        match conn.next_message().await {
            Ok(DaemonMessage::TimerTick { state }) => {
                if state.is_break && !was_break {
                    last_break_secs = state.time_left;
                }
                was_break = state.is_break;
                println!("{}", format_state(&state));
            }
            Ok(DaemonMessage::TimerComplete {
                was_break: completed_break,
                ..
            }) => {
                if completed_break {
                    println!("== break over, time to focus ==");
                    stats.total_break_time += last_break_secs.div_ceil(60);
                } else {
                    println!("== pomodoro complete, take a break ==");
                    stats.total_pomodoros += 1;
                    stats.total_focus_time += settings.work_duration;
                }
                conn.send(pomo_protocol::MessageType::SaveStats {
                    stats: stats.clone(),
                })
                .await?;
                pending_acks += 1;
            }
            Ok(DaemonMessage::Ack) if pending_acks > 0 => {
                pending_acks -= 1;
            }
            Ok(other) => {
                tracing::debug!(message = ?other, "ignoring message in watch mode");
            }
            Err(e) => {
                eprintln!("connection lost: {e}");
                return Ok(());
            }
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = DaemonClient::from_env();
    let mut conn = client.connect().await?;

    match args.command {
        Command::Status => {
            let state = conn.timer_get_state().await?;
            println!("{}", format_state(&state));
        }
        Command::Start => {
            conn.timer_start().await?;
            println!("{}", format_state(&conn.timer_get_state().await?));
        }
        Command::Pause => {
            conn.timer_pause().await?;
            println!("{}", format_state(&conn.timer_get_state().await?));
        }
        Command::Reset => {
            conn.timer_reset().await?;
            println!("{}", format_state(&conn.timer_get_state().await?));
        }
        Command::Watch => {
            watch(conn).await?;
        }
        Command::Settings { command } => match command {
            SettingsCommand::Show => {
                let settings = conn.get_settings().await?;
                println!("work:                 {} min", settings.work_duration);
                println!("short break:          {} min", settings.short_break_duration);
                println!("long break:           {} min", settings.long_break_duration);
                println!("long break interval:  {}", settings.long_break_interval);
                println!("auto-start breaks:    {}", settings.auto_start_breaks);
                println!("auto-start pomodoros: {}", settings.auto_start_pomodoros);
                println!("sound:                {}", settings.sound_enabled);
            }
            SettingsCommand::Set {
                work,
                short_break,
                long_break,
                interval,
                auto_start_breaks,
                auto_start_pomodoros,
                sound,
            } => {
                let mut settings = conn.get_settings().await?;
                if let Some(v) = work {
                    settings.work_duration = v;
                }
                if let Some(v) = short_break {
                    settings.short_break_duration = v;
                }
                if let Some(v) = long_break {
                    settings.long_break_duration = v;
                }
                if let Some(v) = interval {
                    settings.long_break_interval = v;
                }
                if let Some(v) = auto_start_breaks {
                    settings.auto_start_breaks = v;
                }
                if let Some(v) = auto_start_pomodoros {
                    settings.auto_start_pomodoros = v;
                }
                if let Some(v) = sound {
                    settings.sound_enabled = v;
                }
                conn.save_settings(settings).await?;
                println!("settings saved");
            }
        },
        Command::Tasks { command } => match command {
            TasksCommand::List => {
                let tasks = conn.get_tasks().await?;
                if tasks.is_empty() {
                    println!("no tasks");
                }
                for task in tasks {
                    let mark = if task.completed { "x" } else { " " };
                    println!(
                        "[{mark}] {}  {} ({}/{})",
                        task.id.short(),
                        task.title,
                        task.pomodoros,
                        task.estimated_pomodoros
                    );
                }
            }
            TasksCommand::Add { title, estimate } => {
                let mut tasks = conn.get_tasks().await?;
                let task = Task::new(title, estimate);
                let id = task.id.clone();
                tasks.push(task);
                conn.save_tasks(tasks).await?;
                println!("added {id}");
            }
            TasksCommand::Done { id } => {
                let mut tasks = conn.get_tasks().await?;
                let matches: Vec<_> = tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.id.as_str().starts_with(&id))
                    .map(|(i, _)| i)
                    .collect();
                match matches.as_slice() {
                    [index] => {
                        let index = *index;
                        if let Some(task) = tasks.get_mut(index) {
                            task.completed = true;
                            println!("done: {}", task.title);
                        }
                        conn.save_tasks(tasks).await?;

                        // completed tasks feed the cumulative counter
                        let mut stats = conn.get_stats().await?;
                        stats.total_completed_tasks += 1;
                        conn.save_stats(stats).await?;
                    }
                    [] => {
                        eprintln!("no task matches '{id}'");
                        std::process::exit(1);
                    }
                    _ => {
                        eprintln!("'{id}' is ambiguous ({} matches)", matches.len());
                        std::process::exit(1);
                    }
                }
            }
        },
        Command::Stats { command } => match command {
            StatsCommand::Show => {
                let stats = conn.get_stats().await?;
                print_stats(&stats);
            }
            StatsCommand::Reset => {
                conn.reset_stats().await?;
                println!("stats reset");
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(59), "0:59");
        assert_eq!(format_clock(60), "1:00");
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(3599), "59:59");
    }

    #[test]
    fn test_format_state_work_paused() {
        let state = TimerState {
            time_left: 1500,
            ..TimerState::default()
        };
        assert_eq!(format_state(&state), "work 25:00 paused \u{00b7} 0 pomodoros");
    }

    #[test]
    fn test_format_state_break_running() {
        let state = TimerState {
            time_left: 300,
            is_running: true,
            is_break: true,
            completed_pomodoros: 2,
            current_task_id: None,
        };
        assert_eq!(
            format_state(&state),
            "break 5:00 running \u{00b7} 2 pomodoros"
        );
    }
}
