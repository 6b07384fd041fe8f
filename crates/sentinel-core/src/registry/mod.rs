//! Plugin-based backend registry
//!
//! The registry lets DNS clients and orchestrators be registered by name at
//! startup, so the daemon never hardcodes a backend.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sentinel_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//!
//! // Each plugin crate exposes a `register()` function
//! sentinel_provider_inwx::register(&registry);
//! sentinel_orchestrator_swarm::register(&registry);
//!
//! let dns_client = registry.create_dns_client(&config.provider)?;
//! let orchestrator = registry.create_orchestrator(&config.orchestrator).await?;
//! ```

use crate::config::{OrchestratorConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsClient, DnsClientFactory, Orchestrator, OrchestratorFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry for plugin-based backend creation
///
/// Maps type names (`"inwx"`, `"swarm"`, ...) to factory objects.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS client factories
    dns_clients: RwLock<HashMap<String, Box<dyn DnsClientFactory>>>,

    /// Registered orchestrator factories
    orchestrators: RwLock<HashMap<String, Arc<dyn OrchestratorFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS client factory
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use sentinel_core::registry::ProviderRegistry;
    /// # use sentinel_core::traits::DnsClientFactory;
    /// # struct MyFactory;
    /// # impl DnsClientFactory for MyFactory {
    /// #     fn create(&self, config: &sentinel_core::config::ProviderConfig) -> sentinel_core::Result<Box<dyn sentinel_core::DnsClient>> { unimplemented!() }
    /// # }
    /// let registry = ProviderRegistry::new();
    /// registry.register_dns_client("myprovider", Box::new(MyFactory));
    /// ```
    pub fn register_dns_client(
        &self,
        name: impl Into<String>,
        factory: Box<dyn DnsClientFactory>,
    ) {
        let name = name.into();
        let mut clients = self
            .dns_clients
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        clients.insert(name, factory);
    }

    /// Register an orchestrator factory
    pub fn register_orchestrator(
        &self,
        name: impl Into<String>,
        factory: Box<dyn OrchestratorFactory>,
    ) {
        let name = name.into();
        let mut orchestrators = self
            .orchestrators
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        orchestrators.insert(name, Arc::from(factory));
    }

    /// Create a DNS client from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsClient>)`: Created client instance
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub fn create_dns_client(&self, config: &ProviderConfig) -> Result<Box<dyn DnsClient>> {
        let provider_type = config.type_name();
        let clients = self
            .dns_clients
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let factory = clients.get(provider_type).ok_or_else(|| {
            Error::config(format!("Unsupported DNS provider: {}", provider_type))
        })?;

        factory.create(config)
    }

    /// Create an orchestrator from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Orchestrator>)`: Created orchestrator instance
    /// - `Err(Error)`: If the orchestrator type is not registered or creation fails
    pub async fn create_orchestrator(
        &self,
        config: &OrchestratorConfig,
    ) -> Result<Box<dyn Orchestrator>> {
        let orchestrator_type = config.type_name();

        let factory = {
            let orchestrators = self
                .orchestrators
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            orchestrators
                .get(orchestrator_type)
                .ok_or_else(|| {
                    Error::config(format!(
                        "Unsupported orchestration type: {}",
                        orchestrator_type
                    ))
                })?
                .clone()
        };

        // Lock released before awaiting the factory
        factory.create(config).await
    }

    /// List all registered DNS provider types
    pub fn list_dns_clients(&self) -> Vec<String> {
        let clients = self
            .dns_clients
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        clients.keys().cloned().collect()
    }

    /// List all registered orchestrator types
    pub fn list_orchestrators(&self) -> Vec<String> {
        let orchestrators = self
            .orchestrators
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        orchestrators.keys().cloned().collect()
    }

    /// Check if a DNS provider type is registered
    pub fn has_dns_client(&self, name: &str) -> bool {
        let clients = self
            .dns_clients
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        clients.contains_key(name)
    }

    /// Check if an orchestrator type is registered
    pub fn has_orchestrator(&self, name: &str) -> bool {
        let orchestrators = self
            .orchestrators
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        orchestrators.contains_key(name)
    }
}
