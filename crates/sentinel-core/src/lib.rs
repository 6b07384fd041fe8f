// # sentinel-core
//
// Core library for the leader-following DNS sentinel.
//
// Every manager/control-plane node runs one sentinel. The instance on the
// current cluster leader makes sure a single DNS record points at its own
// public IP; all other instances stay idle until leadership moves to them.
//
// ## Architecture Overview
//
// - **Orchestrator**: Trait for observing cluster leadership (Swarm, Kubernetes)
// - **DnsClient**: Trait for reading and upserting records at a DNS provider
// - **Sentinel**: The reconciler that ties both together, once at startup and
//   once per leadership event
// - **ProviderRegistry**: Plugin-based registry for DNS clients and orchestrators
//
// ## Design Principles
//
// 1. **Observe, don't elect**: Leadership is read from the orchestrator, never decided here
// 2. **Event-Driven**: Leadership changes arrive as an async stream
// 3. **Plugin-Based**: Backends are registered by name, selected once at startup
// 4. **Idempotency**: Every pass reads the zone fresh and writes only on mismatch
// 5. **Stateless**: Nothing is cached or persisted between passes

pub mod traits;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{DnsClient, Orchestrator, Record, RecordType, LeadershipEvent};
pub use engine::{Sentinel, SentinelEvent, PassOutcome};
pub use registry::ProviderRegistry;
pub use config::{SentinelConfig, ResolvedConfig, OrchestratorConfig, ProviderConfig};
pub use error::{Error, Result};
