// # DNS Client Trait
//
// Defines the interface for reading and writing records at a DNS provider.
//
// ## Implementations
//
// - INWX: `sentinel-provider-inwx` crate
// - Bunny.net: `sentinel-provider-bunny` crate
//
// ## Usage
//
// ```rust,ignore
// use sentinel_core::{DnsClient, Record};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* DnsClient implementation */;
//
//     let records = client.get_records("example.com.").await?;
//     client
//         .set_records("example.com.", &[Record::address("lb", "10.0.0.2".parse()?, 300)])
//         .await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// DNS record type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Any other type, kept verbatim (CNAME, TXT, MX, ...)
    Other(String),
}

impl RecordType {
    /// Address record type matching the IP version
    pub fn for_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Aaaa => f.write_str("AAAA"),
            RecordType::Other(other) => f.write_str(other),
        }
    }
}

impl FromStr for RecordType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            other => RecordType::Other(other.to_string()),
        })
    }
}

/// A DNS record as seen by the sentinel
///
/// Names are relative to the zone (`"lb"`, `"@"` for the apex).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record name relative to the zone
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Record data (IP literal for address records)
    pub content: String,
    /// Time-to-live in seconds
    pub ttl: u32,
}

impl Record {
    /// Create an address record for the given IP
    pub fn address(name: impl Into<String>, ip: IpAddr, ttl: u32) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::for_ip(&ip),
            content: ip.to_string(),
            ttl,
        }
    }

    /// Whether this record and `other` identify the same RRset (name + type)
    pub fn same_rrset(&self, other: &Record) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.record_type == other.record_type
    }
}

/// Strip a trailing dot from a zone name
pub fn bare_zone(zone: &str) -> &str {
    zone.strip_suffix('.').unwrap_or(zone)
}

/// Turn a fully-qualified name into a name relative to `zone`
///
/// Returns `"@"` for the zone apex. Names outside the zone are returned
/// unchanged (without a trailing dot).
pub fn relative_name(fqdn: &str, zone: &str) -> String {
    let fqdn = bare_zone(fqdn);
    let zone = bare_zone(zone);

    if fqdn.eq_ignore_ascii_case(zone) {
        return "@".to_string();
    }

    let suffix_len = zone.len() + 1;
    if fqdn.len() > suffix_len && fqdn.is_char_boundary(fqdn.len() - suffix_len) {
        let (head, tail) = fqdn.split_at(fqdn.len() - suffix_len);
        if tail.starts_with('.') && tail[1..].eq_ignore_ascii_case(zone) {
            return head.to_string();
        }
    }

    fqdn.to_string()
}

/// Turn a zone-relative name into a fully-qualified name (without trailing dot)
pub fn absolute_name(name: &str, zone: &str) -> String {
    let zone = bare_zone(zone);
    if name.is_empty() || name == "@" {
        zone.to_string()
    } else {
        format!("{}.{}", name, zone)
    }
}

/// Trait for DNS provider clients
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Sessions
///
/// Providers with stateful sessions handle login internally. When the
/// provider reports an expired session, the client logs in again and retries
/// the request exactly once; a second expiry is returned as
/// [`Error::SessionExpired`](crate::Error::SessionExpired).
///
/// # No Other Retries
///
/// Network and API failures are returned as-is. The sentinel retries on the
/// next leadership event, not inside a pass.
#[async_trait]
pub trait DnsClient: Send + Sync {
    /// Fetch all records currently published in `zone`
    ///
    /// `zone` is given in trailing-dot form (`"example.com."`).
    async fn get_records(&self, zone: &str) -> Result<Vec<Record>, crate::Error>;

    /// Create or overwrite `records` in `zone`, matched by name and type
    ///
    /// Returns the records as written.
    async fn set_records(
        &self,
        zone: &str,
        records: &[Record],
    ) -> Result<Vec<Record>, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS clients from configuration
pub trait DnsClientFactory: Send + Sync {
    /// Create a DnsClient instance from configuration
    ///
    /// Must not perform network I/O.
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsClient>, crate::Error>;
}
