//! Contract Test: Startup Checks
//!
//! Verifies that a misconfigured sentinel refuses to start and never touches
//! DNS.
//!
//! Constraints verified:
//! - Invalid configuration is fatal
//! - Orchestrator configuration errors are fatal, before the IP lookup
//! - A node without a public IP is fatal
//! - None of the above perform DNS calls

mod common;

use common::*;
use sentinel_core::Sentinel;
use std::net::IpAddr;

#[tokio::test]
async fn orchestrator_config_errors_abort_startup() {
    let (orchestrator, handle) = ControlledOrchestrator::new(IpAddr::from([10, 0, 0, 2]), true);
    let orchestrator =
        orchestrator.with_config_errors(&["swarm mode is not active", "node is not a manager"]);
    let dns = MockDnsClient::new("test", vec![]);

    let err = Sentinel::new(
        Box::new(orchestrator),
        Box::new(MockDnsClient::sharing_counters_with(&dns)),
        minimal_config("example.com", "lb"),
    )
    .await
    .err()
    .expect("startup must fail");

    assert!(err.is_fatal());
    let message = err.to_string();
    assert!(message.contains("swarm mode is not active"));
    assert!(message.contains("node is not a manager"));

    assert_eq!(handle.public_ip_calls(), 0, "config errors are checked first");
    assert!(dns.calls().is_empty());
}

#[tokio::test]
async fn missing_public_ip_aborts_startup() {
    let (orchestrator, handle) = ControlledOrchestrator::new(IpAddr::from([10, 0, 0, 2]), true);
    let dns = MockDnsClient::new("test", vec![]);

    let err = Sentinel::new(
        Box::new(orchestrator.without_public_ip()),
        Box::new(MockDnsClient::sharing_counters_with(&dns)),
        minimal_config("example.com", "lb"),
    )
    .await
    .err()
    .expect("startup must fail");

    assert!(err.is_fatal());
    assert!(err.to_string().contains("Could not get public IP"));
    assert_eq!(handle.public_ip_calls(), 1);
    assert_eq!(handle.is_leader_calls(), 0);
    assert!(dns.calls().is_empty());
}

#[tokio::test]
async fn invalid_config_aborts_before_backend_calls() {
    let (orchestrator, handle) = ControlledOrchestrator::new(IpAddr::from([10, 0, 0, 2]), true);
    let dns = MockDnsClient::new("test", vec![]);

    let mut config = minimal_config("example.com", "lb");
    config.record_ttl = 0;

    let err = Sentinel::new(
        Box::new(orchestrator),
        Box::new(MockDnsClient::sharing_counters_with(&dns)),
        config,
    )
    .await
    .err()
    .expect("startup must fail");

    assert!(err.is_fatal());
    assert_eq!(handle.public_ip_calls(), 0);
    assert!(dns.calls().is_empty());
}

#[tokio::test]
async fn resolved_config_carries_server_ip() {
    let (orchestrator, _handle) = ControlledOrchestrator::new(IpAddr::from([10, 0, 0, 2]), true);

    let (sentinel, _events) = Sentinel::new(
        Box::new(orchestrator),
        Box::new(MockDnsClient::new("test", vec![])),
        minimal_config("example.com", "lb"),
    )
    .await
    .unwrap();

    assert_eq!(sentinel.config().server_ip(), IpAddr::from([10, 0, 0, 2]));
    assert_eq!(sentinel.config().zone(), "example.com.");
    assert_eq!(sentinel.config().fqdn(), "lb.example.com");
}
