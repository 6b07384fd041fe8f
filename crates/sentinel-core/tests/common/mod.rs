//! Test doubles and common utilities for sentinel contract tests
//!
//! These doubles record every call so tests can assert on exactly which
//! backend operations a pass performed.

#![allow(dead_code)]

use sentinel_core::config::{EngineConfig, OrchestratorConfig, ProviderConfig, SentinelConfig};
use sentinel_core::error::{Error, Result};
use sentinel_core::traits::{DnsClient, LeadershipEvent, Orchestrator, Record, RecordType};
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// A controlled Orchestrator whose leadership and events are set by the test
pub struct ControlledOrchestrator {
    leader: Arc<AtomicBool>,
    public_ip: Option<IpAddr>,
    config_errors: Vec<String>,
    current_tx: Arc<Mutex<Option<mpsc::UnboundedSender<LeadershipEvent>>>>,
    is_leader_calls: Arc<AtomicUsize>,
    public_ip_calls: Arc<AtomicUsize>,
    watch_calls: Arc<AtomicUsize>,
}

/// Test-side handle to a [`ControlledOrchestrator`]
#[derive(Clone)]
pub struct OrchestratorHandle {
    leader: Arc<AtomicBool>,
    current_tx: Arc<Mutex<Option<mpsc::UnboundedSender<LeadershipEvent>>>>,
    is_leader_calls: Arc<AtomicUsize>,
    public_ip_calls: Arc<AtomicUsize>,
    watch_calls: Arc<AtomicUsize>,
}

impl ControlledOrchestrator {
    /// Create a new controlled orchestrator
    pub fn new(public_ip: IpAddr, leader: bool) -> (Self, OrchestratorHandle) {
        let orchestrator = Self {
            leader: Arc::new(AtomicBool::new(leader)),
            public_ip: Some(public_ip),
            config_errors: Vec::new(),
            current_tx: Arc::new(Mutex::new(None)),
            is_leader_calls: Arc::new(AtomicUsize::new(0)),
            public_ip_calls: Arc::new(AtomicUsize::new(0)),
            watch_calls: Arc::new(AtomicUsize::new(0)),
        };

        let handle = OrchestratorHandle {
            leader: Arc::clone(&orchestrator.leader),
            current_tx: Arc::clone(&orchestrator.current_tx),
            is_leader_calls: Arc::clone(&orchestrator.is_leader_calls),
            public_ip_calls: Arc::clone(&orchestrator.public_ip_calls),
            watch_calls: Arc::clone(&orchestrator.watch_calls),
        };

        (orchestrator, handle)
    }

    /// Make `node_public_ip()` fail
    pub fn without_public_ip(mut self) -> Self {
        self.public_ip = None;
        self
    }

    /// Report configuration problems from `configuration_errors()`
    pub fn with_config_errors(mut self, errors: &[&str]) -> Self {
        self.config_errors = errors.iter().map(|e| e.to_string()).collect();
        self
    }
}

impl OrchestratorHandle {
    /// Change leadership as seen by subsequent `is_leader()` calls
    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }

    /// Deliver a leadership event on the current watch stream
    ///
    /// Returns `false` if no stream is open.
    pub fn emit(&self, detail: &str) -> bool {
        let guard = self.current_tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx.send(LeadershipEvent::new("controlled", detail)).is_ok(),
            None => false,
        }
    }

    /// Simulate a transport drop: the current watch stream ends
    pub fn disconnect(&self) {
        self.current_tx.lock().unwrap().take();
    }

    /// Get the number of times is_leader() was called
    pub fn is_leader_calls(&self) -> usize {
        self.is_leader_calls.load(Ordering::SeqCst)
    }

    /// Get the number of times node_public_ip() was called
    pub fn public_ip_calls(&self) -> usize {
        self.public_ip_calls.load(Ordering::SeqCst)
    }

    /// Get the number of times watch_events() was called
    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Orchestrator for ControlledOrchestrator {
    async fn node_public_ip(&self) -> Result<IpAddr> {
        self.public_ip_calls.fetch_add(1, Ordering::SeqCst);
        self.public_ip
            .ok_or_else(|| Error::orchestrator("label public_ip not found on node"))
    }

    async fn node_name(&self) -> Result<String> {
        Ok("node-1".to_string())
    }

    async fn is_leader(&self) -> bool {
        self.is_leader_calls.fetch_add(1, Ordering::SeqCst);
        self.leader.load(Ordering::SeqCst)
    }

    async fn configuration_errors(&self) -> Vec<String> {
        self.config_errors.clone()
    }

    fn watch_events(&self) -> Pin<Box<dyn Stream<Item = LeadershipEvent> + Send + 'static>> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);

        // Fresh channel per call, like re-opening a Docker event stream
        let (tx, rx) = mpsc::unbounded_channel();
        *self.current_tx.lock().unwrap() = Some(tx);

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }

    fn orchestrator_name(&self) -> &'static str {
        "controlled"
    }
}

/// A call observed by [`MockDnsClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsCall {
    Get { zone: String },
    Set { zone: String, records: Vec<Record> },
}

/// An in-memory DnsClient that tracks calls
pub struct MockDnsClient {
    zone_records: Arc<Mutex<Vec<Record>>>,
    calls: Arc<Mutex<Vec<DnsCall>>>,
    get_call_count: Arc<AtomicUsize>,
    set_call_count: Arc<AtomicUsize>,
    fail_get: Arc<AtomicBool>,
    fail_set: Arc<AtomicBool>,
    /// Provider name
    pub name: &'static str,
}

impl MockDnsClient {
    pub fn new(name: &'static str, records: Vec<Record>) -> Self {
        Self {
            zone_records: Arc::new(Mutex::new(records)),
            calls: Arc::new(Mutex::new(Vec::new())),
            get_call_count: Arc::new(AtomicUsize::new(0)),
            set_call_count: Arc::new(AtomicUsize::new(0)),
            fail_get: Arc::new(AtomicBool::new(false)),
            fail_set: Arc::new(AtomicBool::new(false)),
            name,
        }
    }

    /// Create a new MockDnsClient that shares zone and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            zone_records: Arc::clone(&other.zone_records),
            calls: Arc::clone(&other.calls),
            get_call_count: Arc::clone(&other.get_call_count),
            set_call_count: Arc::clone(&other.set_call_count),
            fail_get: Arc::clone(&other.fail_get),
            fail_set: Arc::clone(&other.fail_set),
            name: other.name,
        }
    }

    /// Get the number of times get_records() was called
    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times set_records() was called
    pub fn set_call_count(&self) -> usize {
        self.set_call_count.load(Ordering::SeqCst)
    }

    /// Every call in order
    pub fn calls(&self) -> Vec<DnsCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Current zone content
    pub fn records(&self) -> Vec<Record> {
        self.zone_records.lock().unwrap().clone()
    }

    /// Replace the zone content, e.g. to simulate another writer
    pub fn replace_records(&self, records: Vec<Record>) {
        *self.zone_records.lock().unwrap() = records;
    }

    /// Make get_records() fail until reset
    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    /// Make set_records() fail until reset
    pub fn set_fail_set(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DnsClient for MockDnsClient {
    async fn get_records(&self, zone: &str) -> Result<Vec<Record>> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(DnsCall::Get {
            zone: zone.to_string(),
        });

        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Error::http("connection refused"));
        }

        Ok(self.zone_records.lock().unwrap().clone())
    }

    async fn set_records(&self, zone: &str, records: &[Record]) -> Result<Vec<Record>> {
        self.set_call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(DnsCall::Set {
            zone: zone.to_string(),
            records: records.to_vec(),
        });

        if self.fail_set.load(Ordering::SeqCst) {
            return Err(Error::http("503 Service Unavailable"));
        }

        let mut zone_records = self.zone_records.lock().unwrap();
        for record in records {
            match zone_records.iter_mut().find(|r| r.same_rrset(record)) {
                Some(existing) => *existing = record.clone(),
                None => zone_records.push(record.clone()),
            }
        }

        Ok(records.to_vec())
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// An A record in the mock zone
pub fn a_record(name: &str, content: &str) -> Record {
    Record {
        name: name.to_string(),
        record_type: RecordType::A,
        content: content.to_string(),
        ttl: 300,
    }
}

/// Helper to create a minimal SentinelConfig for testing
pub fn minimal_config(domain: &str, record: &str) -> SentinelConfig {
    SentinelConfig {
        domain: domain.to_string(),
        record: record.to_string(),
        record_ttl: 300,
        log_level: Default::default(),
        orchestrator: OrchestratorConfig::Swarm { socket_path: None },
        provider: ProviderConfig::Inwx {
            username: "test-user".to_string(),
            password: "test-password".to_string(),
            sandbox: true,
        },
        engine: EngineConfig {
            dry_run: false,
            watch_restart_delay_secs: 1,
            event_channel_capacity: 100,
        },
    }
}

/// Give the sentinel task a chance to run
pub async fn settle() {
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
}
