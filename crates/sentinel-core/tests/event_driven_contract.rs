//! Contract Test: Event-Driven Passes
//!
//! Verifies that the running sentinel reconciles once at startup and then
//! exactly once per leadership event.
//!
//! Constraints verified:
//! - Startup pass runs unconditionally, before any event
//! - One leadership event → one pass
//! - No polling between events
//! - A dropped event stream is re-opened after the restart delay
//!
//! If this test fails, someone has added:
//! - Periodic timers
//! - Retry loops inside a pass
//! - A watch loop that gives up when the transport drops

mod common;

use common::*;
use sentinel_core::{Sentinel, SentinelEvent};
use std::net::IpAddr;
use tokio::time::{Duration, sleep, timeout};

#[tokio::test]
async fn startup_pass_runs_before_any_event() {
    let (orchestrator, handle) = ControlledOrchestrator::new(IpAddr::from([10, 0, 0, 2]), true);
    let dns = MockDnsClient::new("test", vec![a_record("lb", "10.0.0.1")]);

    let (sentinel, _events) = Sentinel::new(
        Box::new(orchestrator),
        Box::new(MockDnsClient::sharing_counters_with(&dns)),
        minimal_config("example.com", "lb"),
    )
    .await
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let sentinel_handle =
        tokio::spawn(async move { sentinel.run_with_shutdown(Some(shutdown_rx)).await });

    settle().await;

    assert_eq!(handle.is_leader_calls(), 1, "exactly one startup pass");
    assert_eq!(dns.set_call_count(), 1, "startup pass fixes the stale record");
    assert_eq!(handle.watch_calls(), 1, "event stream opened after startup pass");

    // No events: nothing else happens
    sleep(Duration::from_millis(300)).await;
    assert_eq!(handle.is_leader_calls(), 1, "no polling between events");
    assert_eq!(dns.get_call_count(), 1);

    let _ = shutdown_tx.send(());
    let _ = timeout(Duration::from_secs(5), sentinel_handle).await;
}

#[tokio::test]
async fn one_event_triggers_exactly_one_pass() {
    let (orchestrator, handle) = ControlledOrchestrator::new(IpAddr::from([10, 0, 0, 2]), true);
    let dns = MockDnsClient::new("test", vec![a_record("lb", "10.0.0.2")]);

    let (sentinel, _events) = Sentinel::new(
        Box::new(orchestrator),
        Box::new(MockDnsClient::sharing_counters_with(&dns)),
        minimal_config("example.com", "lb"),
    )
    .await
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let sentinel_handle =
        tokio::spawn(async move { sentinel.run_with_shutdown(Some(shutdown_rx)).await });

    settle().await;
    assert_eq!(dns.get_call_count(), 1);
    assert_eq!(dns.set_call_count(), 0, "record already in sync");

    // Someone else repointed the record; the next event repairs it
    dns.replace_records(vec![a_record("lb", "10.0.0.7")]);
    assert!(handle.emit("node update"));
    settle().await;

    assert_eq!(handle.is_leader_calls(), 2);
    assert_eq!(dns.get_call_count(), 2);
    assert_eq!(dns.set_call_count(), 1, "exactly one write for one event");
    assert_eq!(dns.records(), vec![a_record("lb", "10.0.0.2")]);

    let _ = shutdown_tx.send(());
    let _ = timeout(Duration::from_secs(5), sentinel_handle).await;
}

#[tokio::test]
async fn leadership_handoff_takes_over_the_record() {
    let (orchestrator, handle) = ControlledOrchestrator::new(IpAddr::from([10, 0, 0, 2]), false);
    let dns = MockDnsClient::new("test", vec![a_record("lb", "10.0.0.1")]);

    let (sentinel, mut events) = Sentinel::new(
        Box::new(orchestrator),
        Box::new(MockDnsClient::sharing_counters_with(&dns)),
        minimal_config("example.com", "lb"),
    )
    .await
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let sentinel_handle =
        tokio::spawn(async move { sentinel.run_with_shutdown(Some(shutdown_rx)).await });

    settle().await;
    assert!(dns.calls().is_empty(), "follower stays idle");

    handle.set_leader(true);
    assert!(handle.emit("leader moved"));
    settle().await;

    assert_eq!(dns.set_call_count(), 1);
    assert_eq!(dns.records(), vec![a_record("lb", "10.0.0.2")]);

    let _ = shutdown_tx.send(());
    let _ = timeout(Duration::from_secs(5), sentinel_handle).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&SentinelEvent::NotLeader));
    assert!(seen.contains(&SentinelEvent::LeadershipChanged {
        source: "controlled",
        detail: "leader moved".to_string(),
    }));
    assert!(matches!(seen.last(), Some(SentinelEvent::Stopped { .. })));
}

#[tokio::test]
async fn failed_pass_waits_for_next_event() {
    let (orchestrator, handle) = ControlledOrchestrator::new(IpAddr::from([10, 0, 0, 2]), true);
    let dns = MockDnsClient::new("test", vec![a_record("lb", "10.0.0.1")]);
    dns.set_fail_set(true);

    let (sentinel, _events) = Sentinel::new(
        Box::new(orchestrator),
        Box::new(MockDnsClient::sharing_counters_with(&dns)),
        minimal_config("example.com", "lb"),
    )
    .await
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let sentinel_handle =
        tokio::spawn(async move { sentinel.run_with_shutdown(Some(shutdown_rx)).await });

    sleep(Duration::from_millis(300)).await;
    assert_eq!(dns.set_call_count(), 1, "failed write is not retried on a timer");

    dns.set_fail_set(false);
    assert!(handle.emit("node update"));
    settle().await;

    assert_eq!(dns.set_call_count(), 2);
    assert_eq!(dns.records(), vec![a_record("lb", "10.0.0.2")]);

    let _ = shutdown_tx.send(());
    let _ = timeout(Duration::from_secs(5), sentinel_handle).await;
}

#[tokio::test]
async fn dropped_stream_is_reopened_after_delay() {
    let (orchestrator, handle) = ControlledOrchestrator::new(IpAddr::from([10, 0, 0, 2]), true);
    let dns = MockDnsClient::new("test", vec![a_record("lb", "10.0.0.2")]);

    let (sentinel, mut events) = Sentinel::new(
        Box::new(orchestrator),
        Box::new(MockDnsClient::sharing_counters_with(&dns)),
        minimal_config("example.com", "lb"),
    )
    .await
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let sentinel_handle =
        tokio::spawn(async move { sentinel.run_with_shutdown(Some(shutdown_rx)).await });

    settle().await;
    assert_eq!(handle.watch_calls(), 1);

    handle.disconnect();
    settle().await;
    assert_eq!(handle.watch_calls(), 1, "restart waits for the delay");

    // minimal_config uses a 1s restart delay
    sleep(Duration::from_millis(1200)).await;
    assert_eq!(handle.watch_calls(), 2, "stream re-opened");

    // Events on the new stream are handled like before
    assert!(handle.emit("node update"));
    settle().await;
    assert_eq!(dns.get_call_count(), 2);

    let _ = shutdown_tx.send(());
    let _ = timeout(Duration::from_secs(5), sentinel_handle).await;

    let mut restarted = false;
    while let Ok(event) = events.try_recv() {
        if event == (SentinelEvent::WatchRestarting { delay_secs: 1 }) {
            restarted = true;
        }
    }
    assert!(restarted);
}
