// # Docker Swarm Orchestrator
//
// Leadership source backed by the Docker Engine API on the local socket.
//
// ## How Leadership Is Determined
//
// - The local node ID comes from `GET /info` (`Swarm.NodeID`)
// - `GET /nodes` lists all nodes; this node leads when its
//   `ManagerStatus.Leader` flag is set
// - The advertised address is the node label `public_ip`
//
// ## Events
//
// `GET /events` filtered to `scope=swarm`, `type=node`. Only `update`
// actions are forwarded: leadership moves show up as node updates on every
// manager. The stream ends when the Docker connection drops.
//
// ## Requirements
//
// The daemon must run on a swarm manager (workers cannot list nodes), with
// the Docker socket mounted into the container.

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{EventMessage, EventMessageTypeEnum, LocalNodeState, Node, SystemInfo};
use bollard::query_parameters::{EventsOptions, ListNodesOptions};
use futures_util::StreamExt;
use sentinel_core::config::OrchestratorConfig;
use sentinel_core::traits::{LeadershipEvent, Orchestrator, OrchestratorFactory};
use sentinel_core::{Error, Result};
use std::collections::HashMap;
use std::net::IpAddr;
use std::pin::Pin;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// Node label holding the address to advertise
pub const PUBLIC_IP_LABEL: &str = "public_ip";

/// Timeout for Docker API calls over the socket (seconds)
const DOCKER_TIMEOUT_SECS: u64 = 120;

const ORCHESTRATOR_NAME: &str = "swarm";

/// Docker Swarm orchestrator
pub struct SwarmOrchestrator {
    docker: Docker,
}

impl SwarmOrchestrator {
    /// Connect to the given socket, or the platform default when `None`
    ///
    /// Connecting is lazy: no request is made until the first call.
    pub fn connect(socket_path: Option<&str>) -> Result<Self> {
        let docker = match socket_path {
            Some(path) => {
                Docker::connect_with_socket(path, DOCKER_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            None => Docker::connect_with_socket_defaults(),
        }
        .map_err(|e| Error::orchestrator(format!("Cannot connect to Docker: {}", e)))?;

        Ok(Self { docker })
    }

    async fn node_id(&self) -> Result<String> {
        let info = self
            .docker
            .info()
            .await
            .map_err(|e| Error::orchestrator(format!("Error getting Docker info: {}", e)))?;

        info.swarm
            .and_then(|swarm| swarm.node_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::orchestrator("Could not determine swarm node ID"))
    }

    async fn current_node(&self) -> Result<Node> {
        let node_id = self.node_id().await?;
        self.docker
            .inspect_node(&node_id)
            .await
            .map_err(|e| Error::orchestrator(format!("Error inspecting node {}: {}", node_id, e)))
    }

    async fn check_leader(&self) -> Result<bool> {
        let node_id = self.node_id().await?;
        let nodes = self
            .docker
            .list_nodes(None::<ListNodesOptions>)
            .await
            .map_err(|e| Error::orchestrator(format!("Error listing swarm nodes: {}", e)))?;

        debug!("Swarm has {} nodes", nodes.len());
        Ok(leader_among(&nodes, &node_id))
    }
}

/// Whether the node `node_id` is flagged as leader in `nodes`
fn leader_among(nodes: &[Node], node_id: &str) -> bool {
    nodes.iter().any(|node| {
        node.id.as_deref() == Some(node_id)
            && node
                .manager_status
                .as_ref()
                .and_then(|status| status.leader)
                .unwrap_or(false)
    })
}

fn public_ip_from_labels(node: &Node) -> Result<IpAddr> {
    let node_id = node.id.as_deref().unwrap_or("<unknown>");

    let value = node
        .spec
        .as_ref()
        .and_then(|spec| spec.labels.as_ref())
        .and_then(|labels| labels.get(PUBLIC_IP_LABEL))
        .ok_or_else(|| {
            Error::orchestrator(format!(
                "label {} not found on node {}",
                PUBLIC_IP_LABEL, node_id
            ))
        })?;

    value.trim().parse().map_err(|_| {
        Error::orchestrator(format!(
            "label {} on node {} is not an IP address: {:?}",
            PUBLIC_IP_LABEL, node_id, value
        ))
    })
}

fn swarm_problems(info: &SystemInfo) -> Vec<String> {
    let Some(swarm) = info.swarm.as_ref() else {
        return vec!["Docker is not running in swarm mode".to_string()];
    };

    let mut problems = Vec::new();
    if swarm.local_node_state != Some(LocalNodeState::ACTIVE) {
        problems.push("Docker is not running in swarm mode".to_string());
    } else if swarm.control_available != Some(true) {
        problems.push("This node is not a swarm manager".to_string());
    }
    problems
}

/// Event query limited to swarm node events
fn node_event_options() -> EventsOptions {
    let mut filters = HashMap::new();
    filters.insert("scope".to_string(), vec!["swarm".to_string()]);
    filters.insert("type".to_string(), vec!["node".to_string()]);

    EventsOptions {
        filters: Some(filters),
        ..Default::default()
    }
}

/// Node `update` events qualify, everything else is noise
fn leadership_event(event: &EventMessage) -> Option<LeadershipEvent> {
    if event.typ != Some(EventMessageTypeEnum::NODE) || event.action.as_deref() != Some("update") {
        return None;
    }

    let actor = event
        .actor
        .as_ref()
        .and_then(|actor| actor.id.as_deref())
        .unwrap_or("<unknown>");

    Some(LeadershipEvent::new(
        ORCHESTRATOR_NAME,
        format!("node {} updated", actor),
    ))
}

#[async_trait]
impl Orchestrator for SwarmOrchestrator {
    async fn node_public_ip(&self) -> Result<IpAddr> {
        let node = self.current_node().await?;
        public_ip_from_labels(&node)
    }

    async fn node_name(&self) -> Result<String> {
        let node = self.current_node().await?;

        let hostname = node
            .description
            .as_ref()
            .and_then(|description| description.hostname.clone())
            .filter(|hostname| !hostname.is_empty());

        match (hostname, node.id) {
            (Some(hostname), _) => Ok(hostname),
            (None, Some(id)) => Ok(id),
            (None, None) => Err(Error::orchestrator("Node has neither hostname nor ID")),
        }
    }

    async fn is_leader(&self) -> bool {
        match self.check_leader().await {
            Ok(leader) => leader,
            Err(e) => {
                warn!("Could not determine swarm leadership: {}", e);
                false
            }
        }
    }

    async fn configuration_errors(&self) -> Vec<String> {
        match self.docker.info().await {
            Ok(info) => swarm_problems(&info),
            Err(e) => vec![format!("Cannot reach Docker API: {}", e)],
        }
    }

    fn watch_events(&self) -> Pin<Box<dyn Stream<Item = LeadershipEvent> + Send + 'static>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let mut events = Box::pin(docker.events(Some(node_event_options())));

            info!("Watching Docker swarm node events");

            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        debug!("Event receiver dropped, stopping Docker event watch");
                        break;
                    }
                    item = events.next() => match item {
                        Some(Ok(event)) => {
                            if let Some(event) = leadership_event(&event) {
                                info!("Node update detected: {}", event.detail);
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Docker event stream failed: {}", e);
                            break;
                        }
                        None => {
                            warn!("Docker event stream closed");
                            break;
                        }
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

/// Factory for creating Swarm orchestrators
pub struct SwarmFactory;

#[async_trait]
impl OrchestratorFactory for SwarmFactory {
    async fn create(&self, config: &OrchestratorConfig) -> Result<Box<dyn Orchestrator>> {
        match config {
            OrchestratorConfig::Swarm { socket_path } => {
                Ok(Box::new(SwarmOrchestrator::connect(socket_path.as_deref())?))
            }
            _ => Err(Error::config("Invalid config for swarm orchestrator")),
        }
    }
}

/// Register the Swarm orchestrator with a registry
pub fn register(registry: &sentinel_core::ProviderRegistry) {
    registry.register_orchestrator(ORCHESTRATOR_NAME, Box::new(SwarmFactory));
}
