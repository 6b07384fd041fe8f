// # Orchestrator Trait
//
// Defines the interface for observing cluster leadership.
//
// ## Implementations
//
// - Docker Swarm: `sentinel-orchestrator-swarm` crate
// - Kubernetes: `sentinel-orchestrator-k8s` crate
//
// ## Usage
//
// ```rust,ignore
// use sentinel_core::Orchestrator;
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let orchestrator = /* Orchestrator implementation */;
//
//     if orchestrator.is_leader().await {
//         println!("leading with {}", orchestrator.node_public_ip().await?);
//     }
//
//     let mut events = orchestrator.watch_events();
//     while let Some(event) = events.next().await {
//         println!("leadership changed: {:?}", event);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;
use std::pin::Pin;
use tokio_stream::Stream;

/// A leadership-relevant change observed on the orchestrator
///
/// Carries diagnostics only. Receivers must re-check leadership themselves
/// instead of trusting the event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadershipEvent {
    /// Backend that produced the event (e.g. "swarm")
    pub source: &'static str,
    /// Human-readable description of what changed
    pub detail: String,
}

impl LeadershipEvent {
    /// Create a new leadership event
    pub fn new(source: &'static str, detail: impl Into<String>) -> Self {
        Self {
            source,
            detail: detail.into(),
        }
    }
}

/// Trait for orchestration backends
///
/// An orchestrator answers three questions about the node this process runs
/// on (its address, its name, whether it leads the cluster) and notifies the
/// sentinel when leadership may have moved.
///
/// # Failure Semantics
///
/// - [`is_leader`](Orchestrator::is_leader) never fails: a query error is
///   logged and reported as `false`, so a flaky API can neither crash the
///   loop nor produce a false leadership claim.
/// - [`watch_events`](Orchestrator::watch_events) ends its stream when the
///   transport drops. Restarting it is the caller's job.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Address this node should advertise in DNS
    async fn node_public_ip(&self) -> Result<IpAddr, crate::Error>;

    /// Orchestration-scoped identifier of this node
    async fn node_name(&self) -> Result<String, crate::Error>;

    /// Whether this node currently holds cluster leadership
    ///
    /// Must read fresh state on every call.
    async fn is_leader(&self) -> bool;

    /// Backend-specific preconditions that are not met
    ///
    /// An empty list means the backend is ready. Checked once at startup;
    /// any entry aborts the process.
    async fn configuration_errors(&self) -> Vec<String>;

    /// Stream of leadership-relevant events
    ///
    /// # Behavior
    ///
    /// - Yields exactly one item per qualifying change, nothing for unrelated events
    /// - Never yields items concurrently (it is a plain stream)
    /// - Terminates when the underlying event transport disconnects
    fn watch_events(&self) -> Pin<Box<dyn Stream<Item = LeadershipEvent> + Send + 'static>>;

    /// Get the backend name (for logging/debugging)
    fn orchestrator_name(&self) -> &'static str;
}

/// Helper trait for constructing orchestrators from configuration
///
/// Construction may read local files (kubeconfig, socket paths) but must
/// not contact the cluster.
#[async_trait]
pub trait OrchestratorFactory: Send + Sync {
    /// Create an Orchestrator instance from configuration
    async fn create(
        &self,
        config: &crate::config::OrchestratorConfig,
    ) -> Result<Box<dyn Orchestrator>, crate::Error>;
}
