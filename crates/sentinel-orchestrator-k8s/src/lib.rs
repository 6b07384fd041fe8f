// # Kubernetes Orchestrator
//
// Leadership source backed by the kube-controller-manager leader-election
// lease.
//
// ## How Leadership Is Determined
//
// The node this pod runs on is named by `NODE_NAME` (downward API). The
// node leads when the lease `kube-system/kube-controller-manager` is held
// by an identity of the form `<node>_<uuid>` (or exactly `<node>`), which
// is what the controller manager writes on control-plane nodes.
//
// ## Address
//
// Node label `public_ip`, falling back to the first `ExternalIP` in the
// node status.
//
// ## Events
//
// A watch on the lease object. An event is emitted only when the holder
// identity differs from the last one observed; lease renewals are ignored.
// Watch errors are retried with the watcher's default backoff.
// The last holder survives watch restarts, so a handover that happened
// while disconnected is reported on the first observation after
// reconnecting.

use async_trait::async_trait;
use futures_util::StreamExt;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::Node;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client};
use sentinel_core::config::OrchestratorConfig;
use sentinel_core::traits::{LeadershipEvent, Orchestrator, OrchestratorFactory};
use sentinel_core::{Error, Result};
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// Node label holding the address to advertise
pub const PUBLIC_IP_LABEL: &str = "public_ip";

const ORCHESTRATOR_NAME: &str = "kubernetes";

/// Kubernetes orchestrator
pub struct K8sOrchestrator {
    client: Client,
    node_name: Option<String>,
    lease_namespace: String,
    lease_name: String,
    holder: Arc<Mutex<HolderTracker>>,
}

impl K8sOrchestrator {
    /// Create an orchestrator from an existing client
    pub fn new(
        client: Client,
        node_name: Option<String>,
        lease_namespace: impl Into<String>,
        lease_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            node_name: node_name.filter(|name| !name.is_empty()),
            lease_namespace: lease_namespace.into(),
            lease_name: lease_name.into(),
            holder: Arc::new(Mutex::new(HolderTracker::default())),
        }
    }

    fn require_node_name(&self) -> Result<&str> {
        self.node_name
            .as_deref()
            .ok_or_else(|| Error::config("NODE_NAME environment variable not set"))
    }

    fn leases(&self) -> Api<Lease> {
        Api::namespaced(self.client.clone(), &self.lease_namespace)
    }

    async fn check_leader(&self) -> Result<bool> {
        let node_name = self.require_node_name()?;

        let lease = self.leases().get(&self.lease_name).await.map_err(|e| {
            Error::orchestrator(format!(
                "Error getting lease {}/{}: {}",
                self.lease_namespace, self.lease_name, e
            ))
        })?;

        match lease_holder(&lease) {
            Some(holder) => {
                debug!("Lease {} held by {}", self.lease_name, holder);
                Ok(holder_matches(&holder, node_name))
            }
            None => {
                info!("No holder identity found in lease {}", self.lease_name);
                Ok(false)
            }
        }
    }
}

fn lease_holder(lease: &Lease) -> Option<String> {
    lease
        .spec
        .as_ref()
        .and_then(|spec| spec.holder_identity.clone())
}

/// Whether the lease holder identity belongs to `node_name`
fn holder_matches(holder: &str, node_name: &str) -> bool {
    holder == node_name
        || holder
            .strip_prefix(node_name)
            .is_some_and(|rest| rest.starts_with('_'))
}

fn node_public_ip_from(node: &Node) -> Result<IpAddr> {
    let name = node.metadata.name.as_deref().unwrap_or("<unknown>");

    let labelled = node
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(PUBLIC_IP_LABEL));

    if let Some(value) = labelled {
        return value.trim().parse().map_err(|_| {
            Error::orchestrator(format!(
                "label {} on node {} is not an IP address: {:?}",
                PUBLIC_IP_LABEL, name, value
            ))
        });
    }

    node.status
        .as_ref()
        .and_then(|status| status.addresses.as_ref())
        .and_then(|addresses| {
            addresses
                .iter()
                .filter(|address| address.type_ == "ExternalIP")
                .find_map(|address| address.address.parse().ok())
        })
        .ok_or_else(|| {
            Error::orchestrator(format!(
                "no external IP found for node {} (neither in addresses nor in {} label)",
                name, PUBLIC_IP_LABEL
            ))
        })
}

/// Last observed lease holder
#[derive(Debug, Default)]
struct HolderTracker {
    /// `None` until the first observation
    seen: Option<Option<String>>,
}

impl HolderTracker {
    /// Record `holder`; returns the previous holder if it changed
    ///
    /// The very first observation only sets the baseline.
    fn observe(&mut self, holder: Option<String>) -> Option<Option<String>> {
        match self.seen.replace(holder.clone()) {
            Some(previous) if previous != holder => Some(previous),
            _ => None,
        }
    }
}

/// What the watch task does with one watcher item
#[derive(Debug, PartialEq)]
enum WatchStep {
    Forward(LeadershipEvent),
    Continue,
    Stop,
}

fn watch_step<E: std::fmt::Display>(
    tracker: &Mutex<HolderTracker>,
    item: Option<std::result::Result<Lease, E>>,
) -> WatchStep {
    match item {
        Some(Ok(lease)) => {
            let holder = lease_holder(&lease);
            let changed = tracker
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .observe(holder.clone());

            match changed {
                Some(previous) => {
                    let detail = format!(
                        "lease holder {} -> {}",
                        previous.as_deref().unwrap_or("<none>"),
                        holder.as_deref().unwrap_or("<none>")
                    );
                    info!("Leader change detected: {}", detail);
                    WatchStep::Forward(LeadershipEvent::new(ORCHESTRATOR_NAME, detail))
                }
                None => WatchStep::Continue,
            }
        }
        // The watcher re-lists after a backoff
        Some(Err(e)) => {
            warn!("Lease watch error, retrying: {}", e);
            WatchStep::Continue
        }
        None => {
            warn!("Lease watch closed");
            WatchStep::Stop
        }
    }
}

#[async_trait]
impl Orchestrator for K8sOrchestrator {
    async fn node_public_ip(&self) -> Result<IpAddr> {
        let node_name = self.require_node_name()?;

        let nodes: Api<Node> = Api::all(self.client.clone());
        let node = nodes
            .get(node_name)
            .await
            .map_err(|e| Error::orchestrator(format!("Error getting node {}: {}", node_name, e)))?;

        node_public_ip_from(&node)
    }

    async fn node_name(&self) -> Result<String> {
        self.require_node_name().map(str::to_string)
    }

    async fn is_leader(&self) -> bool {
        match self.check_leader().await {
            Ok(leader) => leader,
            Err(e) => {
                warn!("Could not determine Kubernetes leadership: {}", e);
                false
            }
        }
    }

    async fn configuration_errors(&self) -> Vec<String> {
        match self.require_node_name() {
            Ok(_) => Vec::new(),
            Err(_) => vec!["NODE_NAME environment variable not set".to_string()],
        }
    }

    fn watch_events(&self) -> Pin<Box<dyn Stream<Item = LeadershipEvent> + Send + 'static>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let leases = self.leases();
        let lease_name = self.lease_name.clone();
        let tracker = Arc::clone(&self.holder);

        tokio::spawn(async move {
            let config = watcher::Config::default().fields(&format!("metadata.name={}", lease_name));
            let mut events = Box::pin(watcher(leases, config).default_backoff().applied_objects());

            info!("Watching lease {} for leader changes", lease_name);

            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        debug!("Event receiver dropped, stopping lease watch");
                        break;
                    }
                    item = events.next() => match watch_step(&tracker, item) {
                        WatchStep::Forward(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        WatchStep::Continue => {}
                        WatchStep::Stop => break,
                    }
                }
            }
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    fn orchestrator_name(&self) -> &'static str {
        ORCHESTRATOR_NAME
    }
}

/// Factory for creating Kubernetes orchestrators
///
/// Uses `KUBECONFIG` when set, the in-cluster service account otherwise.
pub struct K8sFactory;

#[async_trait]
impl OrchestratorFactory for K8sFactory {
    async fn create(&self, config: &OrchestratorConfig) -> Result<Box<dyn Orchestrator>> {
        match config {
            OrchestratorConfig::Kubernetes {
                node_name,
                lease_namespace,
                lease_name,
            } => {
                let client = Client::try_default().await.map_err(|e| {
                    Error::config(format!("Error creating Kubernetes client: {}", e))
                })?;

                Ok(Box::new(K8sOrchestrator::new(
                    client,
                    node_name.clone(),
                    lease_namespace.clone(),
                    lease_name.clone(),
                )))
            }
            _ => Err(Error::config("Invalid config for kubernetes orchestrator")),
        }
    }
}

/// Register the Kubernetes orchestrator with a registry
pub fn register(registry: &sentinel_core::ProviderRegistry) {
    registry.register_orchestrator(ORCHESTRATOR_NAME, Box::new(K8sFactory));
}
