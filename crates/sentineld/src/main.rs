// # sentineld - DNS Sentinel Daemon
//
// Keeps one DNS record pointed at whichever node currently leads the
// cluster. Every node runs a copy; only the leader ever writes.
//
// The daemon is a thin integration layer:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Registers the compiled-in orchestrators and DNS clients
// 4. Starts the sentinel and waits for SIGINT/SIGTERM
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Record
// - `SENTINEL_DOMAIN`: Zone under management (default: example.com)
// - `SENTINEL_RECORD`: Record name relative to the zone (default: lb)
// - `SENTINEL_RECORD_TTL`: TTL in seconds (default: provider specific)
//
// ### Orchestration
// - `SENTINEL_ORCHESTRATION_TYPE`: swarm or kubernetes (default: swarm)
// - `SENTINEL_DOCKER_SOCKET`: Docker socket path (swarm)
// - `NODE_NAME` / `SENTINEL_NODE_NAME`: Node this pod runs on (kubernetes)
// - `SENTINEL_LEASE_NAMESPACE`: Leader lease namespace (default: kube-system)
// - `SENTINEL_LEASE_NAME`: Leader lease name (default: kube-controller-manager)
// - `KUBECONFIG`: Kubeconfig path when running outside the cluster
//
// ### DNS Provider
// - `SENTINEL_DNS_PROVIDER`: inwx or bunny (default: inwx)
// - `SENTINEL_INWX_USER`: INWX account name
// - `SENTINEL_INWX_PASSWORD`: INWX password, unless the secret
//   `/run/secrets/inwx_password` is mounted
// - `SENTINEL_INWX_SANDBOX`: Use the INWX test environment
// - `SENTINEL_BUNNY_API_KEY`: Bunny.net account API key
//
// ### Engine
// - `SENTINEL_LOG_LEVEL`: DEBUG, INFO or ERROR (default and fallback: INFO)
// - `SENTINEL_DRY_RUN`: Log intended writes without performing them
// - `SENTINEL_WATCH_RESTART_DELAY_SECS`: Delay before re-opening a dropped
//   event stream (default: 5)
//
// ## Example
//
// ```bash
// export SENTINEL_ORCHESTRATION_TYPE=swarm
// export SENTINEL_DNS_PROVIDER=bunny
// export SENTINEL_BUNNY_API_KEY=your_key
// export SENTINEL_DOMAIN=example.com
// export SENTINEL_RECORD=lb
//
// sentineld
// ```

use anyhow::{Context, Result};
use sentinel_core::config::LogLevel;
use sentinel_core::{ProviderRegistry, Sentinel, SentinelConfig, SentinelEvent};
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SentinelExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SentinelExitCode> for ExitCode {
    fn from(code: SentinelExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn tracing_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Trace => Level::TRACE,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}

/// Exit code for a failed daemon run
///
/// Configuration and input errors are startup failures, everything else is
/// unexpected.
fn exit_code_for(err: &anyhow::Error) -> SentinelExitCode {
    match err.downcast_ref::<sentinel_core::Error>() {
        Some(e) if e.is_fatal() => SentinelExitCode::ConfigError,
        _ => SentinelExitCode::RuntimeError,
    }
}

fn main() -> ExitCode {
    // Load and validate configuration from environment
    let config = match SentinelConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SentinelExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing_level(config.log_level))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SentinelExitCode::ConfigError.into();
    }

    info!("Starting sentineld daemon");
    if let Ok(raw) = std::env::var("SENTINEL_LOG_LEVEL") {
        if let Err(e) = raw.parse::<LogLevel>() {
            warn!("{}; using {}", e, config.log_level.as_str());
        }
    }
    info!(
        "Configuration loaded: {} via {} on {}",
        config.fqdn(),
        config.provider.type_name(),
        config.orchestrator.type_name()
    );
    if config.engine.dry_run {
        warn!("Dry-run mode: DNS records will not be modified");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SentinelExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => SentinelExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                exit_code_for(&e)
            }
        }
    });

    result.into()
}

fn build_registry() -> ProviderRegistry {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "inwx")]
    sentinel_provider_inwx::register(&registry);

    #[cfg(feature = "bunny")]
    sentinel_provider_bunny::register(&registry);

    #[cfg(feature = "swarm")]
    sentinel_orchestrator_swarm::register(&registry);

    #[cfg(feature = "kubernetes")]
    sentinel_orchestrator_k8s::register(&registry);

    info!(
        "Registered DNS providers: [{}], orchestrators: [{}]",
        registry.list_dns_clients().join(", "),
        registry.list_orchestrators().join(", ")
    );

    registry
}

/// Run the daemon
async fn run_daemon(config: SentinelConfig) -> Result<()> {
    let registry = build_registry();

    let dns_client = registry
        .create_dns_client(&config.provider)
        .context("Failed to create DNS client")?;

    let orchestrator = registry
        .create_orchestrator(&config.orchestrator)
        .await
        .context("Failed to create orchestrator")?;

    let (sentinel, mut events) = Sentinel::new(orchestrator, dns_client, config)
        .await
        .context("Sentinel startup failed")?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SentinelEvent::PassFailed { record_name, error } => {
                    debug!("Pass for {} failed: {}", record_name, error)
                }
                other => debug!("Sentinel event: {:?}", other),
            }
        }
    });

    sentinel.run().await.context("Sentinel stopped with an error")?;

    info!("Shutting down daemon");
    Ok(())
}
