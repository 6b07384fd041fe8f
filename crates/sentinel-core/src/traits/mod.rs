//! Core traits for the sentinel
//!
//! This module defines the abstract interfaces that all backends must follow.
//!
//! - [`Orchestrator`]: Observe cluster leadership and leadership-change events
//! - [`DnsClient`]: Read and upsert records at a DNS provider

pub mod orchestrator;
pub mod dns_client;

pub use orchestrator::{Orchestrator, LeadershipEvent, OrchestratorFactory};
pub use dns_client::{DnsClient, Record, RecordType, DnsClientFactory};
