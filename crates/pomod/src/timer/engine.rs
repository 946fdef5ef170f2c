//! Timer engine - owns the countdown and processes commands.
//!
//! The `TimerEngine` is the single owner of the live timer state. It
//! receives commands via an mpsc channel and publishes events via
//! broadcast. The 1-second clock is a `tokio` interval held strictly
//! 1:1 with the running flag: created fresh on every transition into
//! running, dropped on pause, reset, and completion. Because the clock
//! is polled by the same select loop that dispatches commands, ticks
//! and commands are mutually exclusive by construction - there is no
//! state the two can race on.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use pomo_core::{BreakKind, TimerSettings, TimerState};

use super::commands::{TimerCommand, TimerEvent};

/// Tick cadence of the countdown.
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// The timer engine - owns the live countdown state.
///
/// # Ownership
///
/// The engine owns:
/// - `state`: the only live `TimerState` in the process
/// - `settings`: the configuration in effect for future segments
/// - `clock`: the recurring tick source, present iff running
///
/// # Thread Safety
///
/// The engine runs in a single task and processes commands and ticks
/// sequentially. All state mutations happen within this single task;
/// observers only ever receive cloned snapshots.
pub struct TimerEngine {
    /// Command receiver
    receiver: mpsc::Receiver<TimerCommand>,

    /// Event publisher for real-time updates to subscribers
    events: broadcast::Sender<TimerEvent>,

    /// Configuration for segment lengths and auto-start behavior
    settings: TimerSettings,

    /// The authoritative countdown state
    state: TimerState,

    /// The recurring clock. `Some` exactly while `state.is_running`;
    /// replaced wholesale on every start so a stale interval can never
    /// keep ticking across a pause or reset.
    clock: Option<Interval>,
}

impl TimerEngine {
    /// Creates a new engine in the initial paused work segment.
    pub fn new(
        settings: TimerSettings,
        receiver: mpsc::Receiver<TimerCommand>,
        events: broadcast::Sender<TimerEvent>,
    ) -> Self {
        let state = TimerState::initial(&settings);
        Self {
            receiver,
            events,
            settings,
            state,
            clock: None,
        }
    }

    /// Runs the engine event loop.
    ///
    /// Services commands and, while running, the 1-second clock, until
    /// the command channel closes (all handles dropped). This is the
    /// main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!(
            time_left = self.state.time_left,
            "timer engine starting"
        );

        loop {
            match self.clock.take() {
                Some(mut clock) => {
                    tokio::select! {
                        biased;

                        cmd = self.receiver.recv() => {
                            self.clock = Some(clock);
                            match cmd {
                                Some(cmd) => self.handle_command(cmd),
                                None => break,
                            }
                        }

                        _ = clock.tick() => {
                            self.clock = Some(clock);
                            self.handle_tick();
                        }
                    }
                }
                None => match self.receiver.recv().await {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
            }
        }

        info!("timer engine stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: TimerCommand) {
        match cmd {
            TimerCommand::Start { respond_to } => {
                self.handle_start();
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(());
            }
            TimerCommand::Pause { respond_to } => {
                self.handle_pause();
                let _ = respond_to.send(());
            }
            TimerCommand::Reset { respond_to } => {
                self.handle_reset();
                let _ = respond_to.send(());
            }
            TimerCommand::GetState { respond_to } => {
                let _ = respond_to.send(self.state.clone());
            }
            TimerCommand::UpdateSettings {
                settings,
                respond_to,
            } => {
                self.handle_update_settings(settings);
                let _ = respond_to.send(());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Handles a start command.
    ///
    /// No-op if already running. Also a silent no-op when the segment
    /// has already run down to zero: starting then would have to pick a
    /// next segment implicitly, and mode transitions belong to
    /// completion handling alone.
    fn handle_start(&mut self) {
        if self.state.is_running {
            return;
        }
        if self.state.time_left == 0 {
            debug!("start ignored: segment elapsed, reset required");
            return;
        }

        self.state.is_running = true;
        self.clock = Some(fresh_clock());

        debug!(
            time_left = self.state.time_left,
            is_break = self.state.is_break,
            "timer started"
        );

        self.broadcast_state();
    }

    /// Handles a pause command. Idempotent.
    fn handle_pause(&mut self) {
        self.clock = None;
        self.state.is_running = false;
        self.broadcast_state();
    }

    /// Handles a reset command. Idempotent.
    ///
    /// Always returns to a paused work segment regardless of the
    /// current mode - resetting from a break does not resume the break.
    fn handle_reset(&mut self) {
        self.clock = None;
        self.state.is_running = false;
        self.state.is_break = false;
        self.state.time_left = self.settings.work_secs();
        self.state.completed_pomodoros = 0;
        self.state.current_task_id = None;

        debug!(time_left = self.state.time_left, "timer reset");

        self.broadcast_state();
    }

    /// Replaces the settings wholesale.
    ///
    /// The segment underway keeps the remaining time it had; only
    /// segments that begin after this call use the new durations.
    fn handle_update_settings(&mut self, settings: TimerSettings) {
        debug!(
            work = settings.work_duration,
            short_break = settings.short_break_duration,
            long_break = settings.long_break_duration,
            interval = settings.long_break_interval,
            "settings updated"
        );
        self.settings = settings;
    }

    // ========================================================================
    // Clock
    // ========================================================================

    /// Handles one clock tick.
    ///
    /// No-op unless running with time remaining; otherwise decrements
    /// by exactly one second, broadcasts the new snapshot, and runs
    /// completion synchronously if the segment just elapsed.
    fn handle_tick(&mut self) {
        if !self.state.is_running || self.state.time_left == 0 {
            return;
        }

        self.state.time_left -= 1;
        self.broadcast_state();

        if self.state.time_left == 0 {
            self.handle_completion();
        }
    }

    /// Handles a segment running down to zero.
    ///
    /// The clock is dropped before anything else so no further tick can
    /// arrive mid-transition. The completion event carries the
    /// pre-transition mode flag; a finished work segment counts itself,
    /// so the event and the long-break decision both see the
    /// incremented total.
    fn handle_completion(&mut self) {
        self.clock = None;
        self.state.is_running = false;

        let was_break = self.state.is_break;
        if !was_break {
            self.state.completed_pomodoros += 1;
        }

        let _ = self.events.send(TimerEvent::Complete {
            was_break,
            completed_pomodoros: self.state.completed_pomodoros,
        });

        if was_break {
            // Break finished: back to work
            self.state.is_break = false;
            self.state.time_left = self.settings.work_secs();

            info!("break complete, work segment ready");

            if self.settings.auto_start_pomodoros {
                self.resume();
            }
        } else {
            // Work finished: into a break
            let kind = BreakKind::after_completion(
                self.state.completed_pomodoros,
                self.settings.long_break_interval,
            );
            self.state.is_break = true;
            self.state.time_left = self.settings.break_secs(kind);

            info!(
                completed = self.state.completed_pomodoros,
                kind = %kind,
                "work segment complete"
            );

            if self.settings.auto_start_breaks {
                self.resume();
            }
        }

        // Post-transition snapshot goes out unconditionally, after the
        // completion event.
        self.broadcast_state();
    }

    /// Chains straight into the next segment with a fresh clock.
    fn resume(&mut self) {
        self.state.is_running = true;
        self.clock = Some(fresh_clock());
    }

    /// Publishes a snapshot of the current state.
    ///
    /// A send with no subscribers is not an error - observers come and
    /// go freely.
    fn broadcast_state(&self) {
        let _ = self.events.send(TimerEvent::Tick {
            state: self.state.clone(),
        });
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns a snapshot of the current state.
    #[cfg(test)]
    fn snapshot(&self) -> TimerState {
        self.state.clone()
    }

    /// Returns whether the clock currently exists.
    #[cfg(test)]
    fn has_clock(&self) -> bool {
        self.clock.is_some()
    }
}

/// Creates the recurring clock for a newly started segment.
///
/// The first tick fires one full period after the start, not
/// immediately, and missed ticks are delayed rather than burst so the
/// countdown never decrements twice for one wall-clock second.
fn fresh_clock() -> Interval {
    let mut clock = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
    clock
}
