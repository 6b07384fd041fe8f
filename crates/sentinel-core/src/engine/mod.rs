//! Core sentinel engine
//!
//! The Sentinel is responsible for:
//! - Gating every pass on fresh leadership status from the Orchestrator
//! - Reading the managed record from the zone via the DnsClient
//! - Writing the record only when it differs from the node's public IP
//! - Re-running the pass for every leadership event, restarting the
//!   event stream when the orchestrator transport drops
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ Orchestrator │─── LeadershipEvent ───┐
//! └──────────────┘                       │
//!        ▲                               ▼
//!        │ is_leader()          ┌──────────────┐
//!        └──────────────────────│   Sentinel   │
//!                               └──────────────┘
//!                                        │
//!                    ┌───────────────────┴───────────────────┐
//!                    ▼                                       ▼
//!           ┌──────────────┐                        ┌─────────────┐
//!           │  DnsClient   │                        │   Events    │
//!           │ (get / set)  │                        │  (notify)   │
//!           └──────────────┘                        └─────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Not leader → stop, no DNS calls
//! 2. Fetch all records of `domain.`
//! 3. First address record named like the configured record → current IP
//! 4. Equal to the server IP → nothing to do
//! 5. Otherwise upsert one address record; failures wait for the next trigger

use crate::config::{ResolvedConfig, SentinelConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsClient, LeadershipEvent, Orchestrator, Record, RecordType};
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Events emitted by the Sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentinelEvent {
    /// Sentinel started
    Started {
        fqdn: String,
        server_ip: IpAddr,
    },

    /// Leadership event received from the orchestrator
    LeadershipChanged {
        source: &'static str,
        detail: String,
    },

    /// Pass skipped because this node is not the leader
    NotLeader,

    /// Record already points at this node
    InSync {
        record_name: String,
        current_ip: IpAddr,
    },

    /// Record was written
    Updated {
        record_name: String,
        previous: Option<String>,
        new_ip: IpAddr,
    },

    /// Write skipped because dry-run mode is on
    DryRun {
        record_name: String,
        previous: Option<String>,
        new_ip: IpAddr,
    },

    /// DNS read or write failed
    PassFailed {
        record_name: String,
        error: String,
    },

    /// Orchestrator event stream ended and will be re-opened
    WatchRestarting {
        delay_secs: u64,
    },

    /// Sentinel stopped
    Stopped {
        reason: String,
    },
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// This node does not lead the cluster; nothing was read or written
    NotLeader,
    /// The record already holds the server IP
    InSync {
        current_ip: IpAddr,
    },
    /// The record was created or overwritten
    Updated {
        /// Previous content, `None` if no matching record existed
        previous: Option<String>,
        new_ip: IpAddr,
    },
    /// A write was needed but dry-run mode suppressed it
    DryRun {
        previous: Option<String>,
        new_ip: IpAddr,
    },
}

/// Core sentinel
///
/// Owns one orchestrator, one DNS client and the resolved configuration for
/// the lifetime of the process.
///
/// ## Lifecycle
///
/// 1. Create with [`Sentinel::new()`] (validates the backend, resolves the IP)
/// 2. Start with [`Sentinel::run()`]
/// 3. One pass runs immediately, then one per leadership event
/// 4. Runs until SIGINT/SIGTERM
///
/// ## Threading
///
/// Passes run strictly one after another on the caller's task. The event
/// stream is only polled between passes, so no two passes ever overlap.
pub struct Sentinel {
    /// Leadership source
    orchestrator: Box<dyn Orchestrator>,

    /// DNS provider client
    dns_client: Box<dyn DnsClient>,

    /// Configuration completed with the server IP
    config: ResolvedConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SentinelEvent>,
}

impl Sentinel {
    /// Create a new sentinel
    ///
    /// Performs the startup checks in order:
    /// 1. Configuration validation
    /// 2. Orchestrator configuration errors (any entry is fatal)
    /// 3. Public IP resolution (failure is fatal)
    ///
    /// # Returns
    ///
    /// A tuple of (sentinel, event_receiver) where event_receiver yields sentinel events
    pub async fn new(
        orchestrator: Box<dyn Orchestrator>,
        dns_client: Box<dyn DnsClient>,
        config: SentinelConfig,
    ) -> Result<(Self, mpsc::Receiver<SentinelEvent>)> {
        config.validate()?;

        let config_errors = orchestrator.configuration_errors().await;
        if !config_errors.is_empty() {
            return Err(Error::config(format!(
                "Invalid {} configuration: {}",
                orchestrator.orchestrator_name(),
                config_errors.join("; ")
            )));
        }

        let server_ip = orchestrator
            .node_public_ip()
            .await
            .map_err(|e| Error::config(format!("Could not get public IP: {}", e)))?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let sentinel = Self {
            orchestrator,
            dns_client,
            config: config.resolve(server_ip),
            event_tx: tx,
        };

        Ok((sentinel, rx))
    }

    /// The resolved configuration
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Run the sentinel
    ///
    /// Runs the startup pass, then follows orchestrator events until
    /// SIGINT/SIGTERM is received.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Internal run implementation that accepts an optional shutdown signal
    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        info!(
            "Sentinel DNS monitor for {} started (provider: {}, orchestrator: {})",
            self.config.fqdn(),
            self.dns_client.provider_name(),
            self.orchestrator.orchestrator_name()
        );
        info!("Server IP: {}", self.config.server_ip());

        match self.orchestrator.node_name().await {
            Ok(name) => info!("Node name: {}", name),
            Err(e) => warn!("Could not determine node name: {}", e),
        }

        self.emit_event(SentinelEvent::Started {
            fqdn: self.config.fqdn(),
            server_ip: self.config.server_ip(),
        });

        let shutdown = async move {
            match shutdown_rx {
                // Test mode: wait for provided shutdown signal
                Some(rx) => {
                    let _ = rx.await;
                    "Shutdown signal"
                }
                // Production mode: wait for SIGINT/SIGTERM
                None => wait_for_termination().await,
            }
        };
        tokio::pin!(shutdown);

        // Startup pass, unconditionally
        tokio::select! {
            _ = self.check_and_update() => {}
            reason = &mut shutdown => {
                self.stop(reason);
                return Ok(());
            }
        }

        let restart_delay = Duration::from_secs(self.config.engine.watch_restart_delay_secs);

        loop {
            let mut events = self.orchestrator.watch_events();

            loop {
                tokio::select! {
                    event = events.next() => match event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    },
                    reason = &mut shutdown => {
                        self.stop(reason);
                        return Ok(());
                    }
                }
            }

            warn!(
                "{} event stream ended, re-opening in {}s",
                self.orchestrator.orchestrator_name(),
                restart_delay.as_secs()
            );
            self.emit_event(SentinelEvent::WatchRestarting {
                delay_secs: restart_delay.as_secs(),
            });

            tokio::select! {
                _ = tokio::time::sleep(restart_delay) => {}
                reason = &mut shutdown => {
                    self.stop(reason);
                    return Ok(());
                }
            }
        }
    }

    /// Handle a leadership event
    async fn handle_event(&self, event: LeadershipEvent) {
        info!(
            "Leadership event from {}: {}, checking leader status",
            event.source, event.detail
        );
        self.emit_event(SentinelEvent::LeadershipChanged {
            source: event.source,
            detail: event.detail,
        });

        self.check_and_update().await;
    }

    /// Run one pass and report its outcome
    ///
    /// Errors are logged and emitted, never propagated: the next trigger
    /// starts over from scratch.
    pub async fn check_and_update(&self) -> Option<PassOutcome> {
        match self.reconcile().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Reconciliation of {} failed: {}", self.config.fqdn(), e);
                self.emit_event(SentinelEvent::PassFailed {
                    record_name: self.config.record.clone(),
                    error: e.to_string(),
                });
                None
            }
        }
    }

    /// Perform one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(PassOutcome)`: What the pass did
    /// - `Err(Error)`: The DNS read or write failed
    pub async fn reconcile(&self) -> Result<PassOutcome> {
        if !self.orchestrator.is_leader().await {
            debug!("This instance is not the leader, skipping DNS check");
            self.emit_event(SentinelEvent::NotLeader);
            return Ok(PassOutcome::NotLeader);
        }

        info!("This instance is the leader");

        let zone = self.config.zone();
        let desired_ip = self.config.server_ip();
        let record_name = &self.config.record;

        let records = self
            .dns_client
            .get_records(&zone)
            .await
            .map_err(|e| self.client_error("Could not get DNS records", e))?;

        let current = find_current(&records, record_name, &RecordType::for_ip(&desired_ip));

        if current.as_ref().is_some_and(|c| content_matches(c, desired_ip)) {
            info!("DNS correctly points to {}", desired_ip);
            self.emit_event(SentinelEvent::InSync {
                record_name: record_name.clone(),
                current_ip: desired_ip,
            });
            return Ok(PassOutcome::InSync {
                current_ip: desired_ip,
            });
        }

        info!(
            "DNS points to {}, should point to {}",
            current.as_deref().unwrap_or("<none>"),
            desired_ip
        );

        let desired = Record::address(record_name.clone(), desired_ip, self.config.record_ttl);

        if self.config.engine.dry_run {
            info!(
                "[DRY-RUN] Would set {} {} {} (ttl {}) in zone {}",
                desired.name, desired.record_type, desired.content, desired.ttl, zone
            );
            self.emit_event(SentinelEvent::DryRun {
                record_name: record_name.clone(),
                previous: current.clone(),
                new_ip: desired_ip,
            });
            return Ok(PassOutcome::DryRun {
                previous: current,
                new_ip: desired_ip,
            });
        }

        self.dns_client
            .set_records(&zone, std::slice::from_ref(&desired))
            .await
            .map_err(|e| self.client_error("DNS update failed", e))?;

        info!("DNS update successful: {} -> {}", self.config.fqdn(), desired_ip);
        self.emit_event(SentinelEvent::Updated {
            record_name: record_name.clone(),
            previous: current.clone(),
            new_ip: desired_ip,
        });

        Ok(PassOutcome::Updated {
            previous: current,
            new_ip: desired_ip,
        })
    }

    fn client_error(&self, context: &str, e: Error) -> Error {
        match e {
            // Keep session expiry distinguishable in logs and tests
            expired @ Error::SessionExpired(_) => expired,
            other => Error::provider(
                self.dns_client.provider_name(),
                format!("{}: {}", context, other),
            ),
        }
    }

    fn stop(&self, reason: &str) {
        info!("{} received, sentinel stopped", reason);
        self.emit_event(SentinelEvent::Stopped {
            reason: reason.to_string(),
        });
    }

    /// Emit a sentinel event
    fn emit_event(&self, event: SentinelEvent) {
        // Never block a pass on observers
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Event channel full, dropping sentinel event: {:?}", event);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event receiver dropped, sentinel event discarded");
            }
        }
    }

    /// Test helper to run the sentinel with a controlled shutdown signal
    ///
    /// Production code should use `run()` instead, which stops on
    /// SIGTERM/SIGINT rather than a programmatic channel.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }
}

/// Content of the first `record_type` record named `record_name`
///
/// Only the family being written is compared, so a dual-stack name never
/// looks out of sync because of its other address record.
fn find_current(records: &[Record], record_name: &str, record_type: &RecordType) -> Option<String> {
    records
        .iter()
        .find(|r| &r.record_type == record_type && r.name.eq_ignore_ascii_case(record_name))
        .map(|r| r.content.clone())
}

fn content_matches(content: &str, desired: IpAddr) -> bool {
    match content.trim().parse::<IpAddr>() {
        Ok(ip) => ip == desired,
        Err(_) => content.trim() == desired.to_string(),
    }
}

/// Wait for SIGINT or SIGTERM
#[cfg(unix)]
async fn wait_for_termination() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to setup SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = tokio::signal::ctrl_c() => "SIGINT",
    }
}

/// Wait for SIGINT (non-Unix fallback)
#[cfg(not(unix))]
async fn wait_for_termination() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
