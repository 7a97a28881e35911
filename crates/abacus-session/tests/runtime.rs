//! Spawned controller under a paused clock
//!
//! These tests exercise the actor loop itself: countdown ticks, the debounce
//! poll, connectivity forwarding and shutdown. The in-memory store keeps the
//! runtime free of real I/O so auto-advance stays deterministic.

mod common;

use std::time::Duration;

use abacus_core::domain::SessionStatus;
use abacus_core::ports::Destination;
use abacus_session::ControllerSettings;

use common::Harness;

#[tokio::test(start_paused = true)]
async fn countdown_runs_to_submission() {
    let h = Harness::new(1);
    let handle = h.controller_with(ControllerSettings::default()).spawn();
    let sid = handle.begin().await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    let remaining = handle.view().remaining_seconds;
    assert!((29..=31).contains(&remaining), "remaining = {}", remaining);
    assert_eq!(h.api.submit_calls(), 0);

    // Past zero plus the time-up notice
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(h.api.submit_calls(), 1);
    assert_eq!(h.notifier.count("timer"), 1);
    assert_eq!(h.navigator.destinations(), vec![Destination::Results(sid)]);

    let view = handle.view();
    assert!(view.finished);
    assert_eq!(view.remaining_seconds, 0);
    assert!(!handle.is_running());
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_are_sent_once() {
    let h = Harness::new(5);
    let handle = h.controller_with(ControllerSettings::default()).spawn();
    handle.begin().await.unwrap();
    let q = h.question(0, 0);

    handle.answer(q, "1").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.answer(q, "12").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.answer(q, "124").unwrap();
    assert_eq!(h.api.answer_attempts(&q), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.api.answer_attempts(&q), 1);
    assert_eq!(h.api.accepted().get(&q).map(String::as_str), Some("124"));
    assert_eq!(handle.view().answered, 1);
}

#[tokio::test(start_paused = true)]
async fn connectivity_transitions_drive_offline_submission() {
    let h = Harness::new(5);
    let handle = h.controller_with(ControllerSettings::default()).spawn();
    let sid = handle.begin().await.unwrap();

    h.go_offline();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let view = handle.view();
    assert!(view.offline_mode);
    assert!(!view.online);

    let q = h.question(1, 1);
    handle.answer(q, "30").unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.notifier.count("answers"), 1);
    assert_eq!(handle.view().pending_answers, 1);

    handle.submit().await.unwrap();
    assert_eq!(handle.view().status, SessionStatus::PendingSubmission);
    assert_eq!(h.api.submit_calls(), 0);

    h.go_online();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.api.accepted().get(&q).map(String::as_str), Some("30"));
    assert_eq!(h.api.submit_calls(), 1);
    assert_eq!(h.navigator.destinations(), vec![Destination::Results(sid)]);
    assert!(handle.view().finished);
}

#[tokio::test(start_paused = true)]
async fn resume_through_handle_continues_countdown() {
    let h = Harness::new(5);
    {
        let mut controller = h.controller();
        controller.begin().await.unwrap();
        for _ in 0..10 {
            controller.tick().await.unwrap();
        }
    }

    let handle = h.controller_with(ControllerSettings::default()).spawn();
    assert!(handle.resume().await.unwrap());
    assert_eq!(handle.view().remaining_seconds, 290);

    tokio::time::sleep(Duration::from_millis(5500)).await;
    assert_eq!(handle.view().remaining_seconds, 285);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_countdown() {
    let h = Harness::new(5);
    let handle = h.controller_with(ControllerSettings::default()).spawn();
    handle.begin().await.unwrap();
    let view = handle.subscribe();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let before = view.borrow().remaining_seconds;
    assert_eq!(before, 297);

    drop(handle);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(view.borrow().remaining_seconds, before);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_the_controller() {
    let h = Harness::new(5);
    let handle = h.controller_with(ControllerSettings::default()).spawn();
    handle.begin().await.unwrap();
    handle.shutdown().await;

    // Nothing was submitted; the attempt stays resumable
    assert_eq!(h.api.submit_calls(), 0);
    let mut controller = h.controller();
    assert!(controller.resume().await.unwrap());
}
