//! Integration tests for the timer engine.
//!
//! These tests verify the engine works correctly as a complete system,
//! testing the spawn_timer() function and TimerHandle interface with
//! the real tokio clock (paused test time).

use std::time::Duration;

use pomo_core::TimerSettings;
use pomod::timer::{spawn_timer, TimerEvent};
use tokio::time::timeout;

// ============================================================================
// Test Helpers
// ============================================================================

/// Settings with a one-minute work segment so clock-driven tests stay
/// within the event buffer.
fn short_settings() -> TimerSettings {
    TimerSettings {
        work_duration: 1,
        short_break_duration: 1,
        ..TimerSettings::default()
    }
}

/// Receives events until one matches the predicate, with a generous
/// deadline (test time is paused, so this is cheap).
async fn recv_until<F>(
    rx: &mut tokio::sync::broadcast::Receiver<TimerEvent>,
    mut pred: F,
) -> TimerEvent
where
    F: FnMut(&TimerEvent) -> bool,
{
    loop {
        let event = timeout(Duration::from_secs(600), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

// ============================================================================
// Basic Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_initial_state() {
    let timer = spawn_timer(TimerSettings::default());

    let state = timer.get_state().await.expect("engine should respond");
    assert_eq!(state.time_left, 1500);
    assert!(!state.is_running);
    assert!(!state.is_break);
    assert_eq!(state.completed_pomodoros, 0);
    assert!(state.current_task_id.is_none());

    assert!(timer.is_connected());
}

#[tokio::test]
async fn test_start_pause_reset_via_handle() {
    let timer = spawn_timer(TimerSettings::default());

    timer.start().await.expect("start should succeed");
    assert!(timer.get_state().await.unwrap().is_running);

    timer.pause().await.expect("pause should succeed");
    assert!(!timer.get_state().await.unwrap().is_running);

    timer.reset().await.expect("reset should succeed");
    let state = timer.get_state().await.unwrap();
    assert_eq!(state.time_left, 1500);
    assert_eq!(state.completed_pomodoros, 0);
}

#[tokio::test]
async fn test_repeated_pause_is_stable() {
    let timer = spawn_timer(TimerSettings::default());

    timer.start().await.unwrap();
    timer.pause().await.unwrap();
    let after_one = timer.get_state().await.unwrap();

    for _ in 0..5 {
        timer.pause().await.unwrap();
    }
    assert_eq!(timer.get_state().await.unwrap(), after_one);
}

#[tokio::test]
async fn test_subscribers_receive_start_broadcast() {
    let timer = spawn_timer(TimerSettings::default());

    let mut rx_a = timer.subscribe();
    let mut rx_b = timer.subscribe();

    timer.start().await.unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("subscriber should see the broadcast")
            .expect("channel open");
        assert!(matches!(event, TimerEvent::Tick { state } if state.is_running));
    }
}

#[tokio::test]
async fn test_dropped_subscriber_does_not_disturb_others() {
    let timer = spawn_timer(TimerSettings::default());

    let rx_gone = timer.subscribe();
    let mut rx_kept = timer.subscribe();
    drop(rx_gone);

    timer.start().await.unwrap();

    let event = timeout(Duration::from_secs(1), rx_kept.recv())
        .await
        .expect("remaining subscriber still receives")
        .expect("channel open");
    assert!(matches!(event, TimerEvent::Tick { .. }));
}

// ============================================================================
// Clock-Driven Tests (paused test time)
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_clock_counts_down_one_second_per_tick() {
    let timer = spawn_timer(short_settings());
    let mut events = timer.subscribe();

    timer.start().await.unwrap();

    // the start broadcast, then the first three clock ticks
    let mut seen = Vec::new();
    for _ in 0..4 {
        if let TimerEvent::Tick { state } = events.recv().await.expect("event") {
            seen.push(state.time_left);
        }
    }
    assert_eq!(seen, vec![60, 59, 58, 57]);
}

#[tokio::test(start_paused = true)]
async fn test_work_segment_completes_into_paused_break() {
    let timer = spawn_timer(short_settings());
    let mut events = timer.subscribe();

    timer.start().await.unwrap();

    let complete = recv_until(&mut events, |e| matches!(e, TimerEvent::Complete { .. })).await;
    assert_eq!(
        complete,
        TimerEvent::Complete {
            was_break: false,
            completed_pomodoros: 1
        }
    );

    // the post-transition snapshot follows the completion event
    let after = recv_until(&mut events, |e| matches!(e, TimerEvent::Tick { .. })).await;
    let TimerEvent::Tick { state } = after else {
        panic!("expected snapshot");
    };
    assert!(state.is_break);
    assert_eq!(state.time_left, 60);
    assert!(!state.is_running, "auto_start_breaks is off");
    assert_eq!(state.completed_pomodoros, 1);

    // paused at the break: no further ticks arrive
    let state = timer.get_state().await.unwrap();
    assert_eq!(state.time_left, 60);
}

#[tokio::test(start_paused = true)]
async fn test_auto_start_chains_through_break_into_work() {
    let settings = TimerSettings {
        work_duration: 1,
        short_break_duration: 1,
        auto_start_breaks: true,
        auto_start_pomodoros: true,
        ..TimerSettings::default()
    };
    let timer = spawn_timer(settings);
    let mut events = timer.subscribe();

    timer.start().await.unwrap();

    // work completes...
    let first = recv_until(&mut events, |e| matches!(e, TimerEvent::Complete { .. })).await;
    assert_eq!(
        first,
        TimerEvent::Complete {
            was_break: false,
            completed_pomodoros: 1
        }
    );

    // ...and the break runs by itself to its own completion
    let second = recv_until(&mut events, |e| matches!(e, TimerEvent::Complete { .. })).await;
    assert_eq!(
        second,
        TimerEvent::Complete {
            was_break: true,
            completed_pomodoros: 1
        }
    );

    // back in a running work segment
    let state = timer.get_state().await.unwrap();
    assert!(!state.is_break);
    assert!(state.is_running);
}

#[tokio::test(start_paused = true)]
async fn test_pause_stops_the_clock() {
    let timer = spawn_timer(short_settings());
    let mut events = timer.subscribe();

    timer.start().await.unwrap();

    // let a couple of ticks through, then pause
    let _ = events.recv().await;
    let _ = events.recv().await;
    timer.pause().await.unwrap();

    let paused_at = timer.get_state().await.unwrap().time_left;

    // drain the pause broadcast, then advance well past several ticks
    while let Ok(event) = events.try_recv() {
        let _ = event;
    }
    tokio::time::advance(Duration::from_secs(30)).await;
    tokio::task::yield_now().await;

    assert_eq!(timer.get_state().await.unwrap().time_left, paused_at);
    assert!(events.try_recv().is_err(), "no ticks while paused");
}

#[tokio::test(start_paused = true)]
async fn test_settings_update_applies_to_next_segment() {
    let timer = spawn_timer(short_settings());

    timer.start().await.unwrap();

    let mut updated = short_settings();
    updated.work_duration = 2;
    timer.update_settings(updated).await.unwrap();

    // the running segment keeps its remaining time
    let state = timer.get_state().await.unwrap();
    assert!(state.time_left <= 60);

    // a reset starts the next segment under the new settings
    timer.reset().await.unwrap();
    assert_eq!(timer.get_state().await.unwrap().time_left, 120);
}
