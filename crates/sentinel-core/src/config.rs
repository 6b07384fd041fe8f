//! Configuration types for the sentinel
//!
//! Configuration is read once from `SENTINEL_`-prefixed environment
//! variables and never changes afterwards. The node's public IP is only
//! known once an orchestrator exists, so it is attached in a second step:
//! [`SentinelConfig::resolve`] consumes the config and returns a
//! [`ResolvedConfig`] carrying the server IP.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::ops::Deref;
use std::path::Path;
use std::str::FromStr;

use crate::traits::dns_client::bare_zone;

/// Prefix shared by every environment variable the sentinel reads
pub const ENV_PREFIX: &str = "SENTINEL_";

/// Docker/Kubernetes secret mount holding the INWX password
pub const INWX_PASSWORD_SECRET_PATH: &str = "/run/secrets/inwx_password";

/// Orchestration selector for Docker Swarm
pub const ORCHESTRATOR_SWARM: &str = "swarm";

/// Orchestration selector for Kubernetes
pub const ORCHESTRATOR_KUBERNETES: &str = "kubernetes";

/// DNS provider selector for INWX
pub const PROVIDER_INWX: &str = "inwx";

/// DNS provider selector for Bunny.net
pub const PROVIDER_BUNNY: &str = "bunny";

/// Main sentinel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Zone under management (e.g. "example.com")
    pub domain: String,

    /// Record name relative to the zone (e.g. "lb")
    pub record: String,

    /// TTL for written records, in seconds
    pub record_ttl: u32,

    /// Log verbosity
    #[serde(default)]
    pub log_level: LogLevel,

    /// Orchestration backend
    pub orchestrator: OrchestratorConfig,

    /// DNS provider and credentials
    pub provider: ProviderConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SentinelConfig {
    /// Create a configuration with default domain/record and the provider's TTL
    pub fn new(orchestrator: OrchestratorConfig, provider: ProviderConfig) -> Self {
        Self {
            domain: "example.com".to_string(),
            record: "lb".to_string(),
            record_ttl: provider.default_ttl(),
            log_level: LogLevel::default(),
            orchestrator,
            provider,
            engine: EngineConfig::default(),
        }
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, crate::Error> {
        Self::from_lookup(
            |key| std::env::var(key).ok(),
            Path::new(INWX_PASSWORD_SECRET_PATH),
        )
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// `lookup` receives full variable names (including [`ENV_PREFIX`]).
    /// `secret_path` is tried for the INWX password before the environment.
    ///
    /// Fails on unknown selectors and missing credentials. Never touches
    /// the network.
    pub fn from_lookup<F>(lookup: F, secret_path: &Path) -> Result<Self, crate::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(&format!("{}{}", ENV_PREFIX, key));
        let env_or = |key: &str, fallback: &str| env(key).unwrap_or_else(|| fallback.to_string());

        // Unknown levels fall back to INFO; sentineld warns once logging is up
        let log_level = env("LOG_LEVEL")
            .and_then(|raw| raw.parse::<LogLevel>().ok())
            .unwrap_or_default();

        let orchestrator = match env_or("ORCHESTRATION_TYPE", ORCHESTRATOR_SWARM)
            .to_lowercase()
            .as_str()
        {
            ORCHESTRATOR_SWARM => OrchestratorConfig::Swarm {
                socket_path: env("DOCKER_SOCKET"),
            },
            ORCHESTRATOR_KUBERNETES | "k8s" => OrchestratorConfig::Kubernetes {
                node_name: env("NODE_NAME")
                    .or_else(|| lookup("NODE_NAME"))
                    .filter(|name| !name.is_empty()),
                lease_namespace: env_or("LEASE_NAMESPACE", DEFAULT_LEASE_NAMESPACE),
                lease_name: env_or("LEASE_NAME", DEFAULT_LEASE_NAME),
            },
            other => {
                return Err(crate::Error::config(format!(
                    "Unsupported orchestration type: {}. Supported types: {}, {}",
                    other, ORCHESTRATOR_SWARM, ORCHESTRATOR_KUBERNETES
                )));
            }
        };

        let provider = match env_or("DNS_PROVIDER", PROVIDER_INWX).to_lowercase().as_str() {
            PROVIDER_INWX => {
                let username = env("INWX_USER")
                    .filter(|user| !user.is_empty())
                    .ok_or_else(|| crate::Error::config("SENTINEL_INWX_USER not set"))?;

                let password = match read_secret(secret_path) {
                    Ok(password) => password,
                    Err(secret_err) => env("INWX_PASSWORD")
                        .filter(|password| !password.is_empty())
                        .ok_or_else(|| {
                            crate::Error::config(format!(
                                "SENTINEL_INWX_PASSWORD not set and could not read from secret {}: {}",
                                secret_path.display(),
                                secret_err
                            ))
                        })?,
                };

                ProviderConfig::Inwx {
                    username,
                    password,
                    sandbox: parse_bool(env("INWX_SANDBOX").as_deref()),
                }
            }
            PROVIDER_BUNNY => {
                let api_key = env("BUNNY_API_KEY")
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| crate::Error::config("SENTINEL_BUNNY_API_KEY not set"))?;

                ProviderConfig::Bunny { api_key }
            }
            other => {
                return Err(crate::Error::config(format!(
                    "Unsupported DNS provider: {}. Supported providers: {}, {}",
                    other, PROVIDER_INWX, PROVIDER_BUNNY
                )));
            }
        };

        let record_ttl = match env("RECORD_TTL") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                crate::Error::config(format!("SENTINEL_RECORD_TTL must be a number, got: {}", raw))
            })?,
            None => provider.default_ttl(),
        };

        let watch_restart_delay_secs = match env("WATCH_RESTART_DELAY_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                crate::Error::config(format!(
                    "SENTINEL_WATCH_RESTART_DELAY_SECS must be a number, got: {}",
                    raw
                ))
            })?,
            None => default_watch_restart_delay_secs(),
        };

        let config = Self {
            domain: env_or("DOMAIN", "example.com"),
            record: env_or("RECORD", "lb"),
            record_ttl,
            log_level,
            orchestrator,
            provider,
            engine: EngineConfig {
                dry_run: parse_bool(env("DRY_RUN").as_deref()),
                watch_restart_delay_secs,
                ..EngineConfig::default()
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_domain_name(bare_zone(&self.domain))?;

        if self.record.is_empty() {
            return Err(crate::Error::config("Record name cannot be empty"));
        }
        if self.record != "@" {
            validate_domain_name(&self.record)?;
        }

        if self.record_ttl == 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }

        if !(1..=300).contains(&self.engine.watch_restart_delay_secs) {
            return Err(crate::Error::config(format!(
                "Watch restart delay must be between 1 and 300 seconds. Got: {}",
                self.engine.watch_restart_delay_secs
            )));
        }

        if self.engine.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.provider.validate()?;

        Ok(())
    }

    /// Zone in trailing-dot form (`"example.com."`)
    pub fn zone(&self) -> String {
        format!("{}.", bare_zone(&self.domain))
    }

    /// Fully-qualified name of the managed record (for logging)
    pub fn fqdn(&self) -> String {
        crate::traits::dns_client::absolute_name(&self.record, &self.domain)
    }

    /// Attach the node's public IP, completing the configuration
    ///
    /// This is the only way to obtain a [`ResolvedConfig`]; the IP cannot
    /// change afterwards.
    pub fn resolve(self, server_ip: IpAddr) -> ResolvedConfig {
        ResolvedConfig {
            config: self,
            server_ip,
        }
    }
}

/// Configuration completed with the node's public IP
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    config: SentinelConfig,
    server_ip: IpAddr,
}

impl ResolvedConfig {
    /// The address the managed record should point at
    pub fn server_ip(&self) -> IpAddr {
        self.server_ip
    }
}

impl Deref for ResolvedConfig {
    type Target = SentinelConfig;

    fn deref(&self) -> &Self::Target {
        &self.config
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Upper-case name as accepted in `SENTINEL_LOG_LEVEL`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(crate::Error::config(format!(
                "SENTINEL_LOG_LEVEL '{}' is not valid. Valid levels: DEBUG, INFO, ERROR",
                s
            ))),
        }
    }
}

/// Default namespace of the leader-election lease
pub const DEFAULT_LEASE_NAMESPACE: &str = "kube-system";

/// Default name of the leader-election lease
pub const DEFAULT_LEASE_NAME: &str = "kube-controller-manager";

/// Orchestration backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorConfig {
    /// Docker Swarm through the local Docker socket
    Swarm {
        /// Docker socket path (None = platform default)
        socket_path: Option<String>,
    },

    /// Kubernetes leader-election lease
    Kubernetes {
        /// Name of the node this pod runs on
        node_name: Option<String>,
        /// Namespace of the lease object
        lease_namespace: String,
        /// Name of the lease object
        lease_name: String,
    },
}

impl OrchestratorConfig {
    /// Get the orchestrator type name (registry key)
    pub fn type_name(&self) -> &str {
        match self {
            OrchestratorConfig::Swarm { .. } => ORCHESTRATOR_SWARM,
            OrchestratorConfig::Kubernetes { .. } => ORCHESTRATOR_KUBERNETES,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig::Swarm { socket_path: None }
    }
}

/// DNS provider configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// INWX JSON-RPC API
    Inwx {
        /// Account user name
        username: String,
        /// Account password
        password: String,
        /// Use the OT&E test environment instead of production
        #[serde(default)]
        sandbox: bool,
    },

    /// Bunny.net DNS API
    Bunny {
        /// Account API key
        api_key: String,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Inwx { username, password, .. } => {
                if username.is_empty() {
                    return Err(crate::Error::config("INWX user cannot be empty"));
                }
                if password.is_empty() {
                    return Err(crate::Error::config("INWX password cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Bunny { api_key } => {
                if api_key.is_empty() {
                    return Err(crate::Error::config("Bunny API key cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name (registry key)
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Inwx { .. } => PROVIDER_INWX,
            ProviderConfig::Bunny { .. } => PROVIDER_BUNNY,
        }
    }

    /// TTL used for written records unless overridden
    pub fn default_ttl(&self) -> u32 {
        match self {
            ProviderConfig::Inwx { .. } => 300,
            ProviderConfig::Bunny { .. } => 15,
        }
    }
}

// Credentials never reach logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Inwx { username, sandbox, .. } => f
                .debug_struct("Inwx")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .field("sandbox", sandbox)
                .finish(),
            ProviderConfig::Bunny { .. } => f
                .debug_struct("Bunny")
                .field("api_key", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log intended DNS writes instead of performing them
    #[serde(default)]
    pub dry_run: bool,

    /// Fixed delay before re-opening a dropped event stream (in seconds)
    #[serde(default = "default_watch_restart_delay_secs")]
    pub watch_restart_delay_secs: u64,

    /// Capacity of the outgoing sentinel event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            watch_restart_delay_secs: default_watch_restart_delay_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_watch_restart_delay_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    100
}

fn parse_bool(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Read a secret file, trimming surrounding whitespace
fn read_secret(path: &Path) -> Result<String, crate::Error> {
    let data = std::fs::read_to_string(path)?;
    let secret = data.trim();
    if secret.is_empty() {
        return Err(crate::Error::config(format!(
            "secret file {} is empty",
            path.display()
        )));
    }
    Ok(secret.to_string())
}

/// Basic DNS name validation (RFC 1035 lengths, LDH labels)
fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        // Underscores are allowed for service-style names (_acme-challenge)
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}
