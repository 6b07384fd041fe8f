// # Bunny.net DNS Client
//
// DNS client for the Bunny.net REST API.
//
// Every call is authenticated with the account API key in the `AccessKey`
// header; there is no session. Each `get_records`/`set_records` call looks
// the zone up by name first, since Bunny addresses zones by numeric ID.
//
// ## API Reference
//
// - Find zone: GET `/dnszone?search=<domain>`
// - Update record: POST `/dnszone/:zone_id/records/:record_id`
// - Add record: PUT `/dnszone/:zone_id/records`

use async_trait::async_trait;
use reqwest::Method;
use sentinel_core::config::ProviderConfig;
use sentinel_core::traits::dns_client::bare_zone;
use sentinel_core::traits::{DnsClient, DnsClientFactory, Record, RecordType};
use sentinel_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Bunny.net API base URL
pub const BUNNY_API_BASE: &str = "https://api.bunny.net";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "bunny";

/// Numeric record type codes used by the Bunny API
const TYPE_CODES: &[(u8, &str)] = &[
    (0, "A"),
    (1, "AAAA"),
    (2, "CNAME"),
    (3, "TXT"),
    (4, "MX"),
    (5, "RDR"),
    (6, "FLATTEN"),
    (7, "PZ"),
    (8, "SRV"),
    (9, "CAA"),
    (10, "PTR"),
    (11, "SCR"),
    (12, "NS"),
];

fn type_from_code(code: u8) -> RecordType {
    match TYPE_CODES.iter().find(|(c, _)| *c == code) {
        Some((_, name)) => {
            let Ok(record_type) = name.parse::<RecordType>();
            record_type
        }
        None => RecordType::Other(format!("TYPE{}", code)),
    }
}

fn code_for_type(record_type: &RecordType) -> Option<u8> {
    let name = record_type.to_string();
    TYPE_CODES
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(&name))
        .map(|(c, _)| *c)
}

/// Bunny uses an empty name for the apex
fn to_bunny_name(name: &str) -> &str {
    if name == "@" { "" } else { name }
}

fn from_bunny_name(name: &str) -> String {
    if name.is_empty() {
        "@".to_string()
    } else {
        name.to_string()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ZoneList {
    #[serde(default)]
    items: Vec<Zone>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Zone {
    id: u64,
    domain: String,
    #[serde(default)]
    records: Vec<BunnyRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BunnyRecord {
    id: u64,
    #[serde(rename = "Type")]
    record_type: u8,
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    ttl: u32,
}

impl BunnyRecord {
    fn to_record(&self) -> Record {
        Record {
            name: from_bunny_name(&self.name),
            record_type: type_from_code(self.record_type),
            content: self.value.clone(),
            ttl: self.ttl,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RecordBody<'a> {
    #[serde(rename = "Type")]
    record_type: u8,
    name: &'a str,
    value: &'a str,
    ttl: u32,
}

/// Bunny.net DNS client
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API key.
pub struct BunnyClient {
    /// ⚠️ NEVER log this value
    api_key: String,

    base_url: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for BunnyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BunnyClient")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BunnyClient {
    /// Create a client for the public Bunny API
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, BUNNY_API_BASE)
    }

    /// Create a client against another base URL (tests, proxies)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::config("Bunny API key is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("AccessKey", &self.api_key)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: reqwest::RequestBuilder, action: &str) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(match status.as_u16() {
            401 | 403 => Error::auth(format!("Bunny rejected the API key. Status: {}", status)),
            404 => Error::provider(PROVIDER_NAME, format!("{}: not found - {}", action, error_text)),
            429 => Error::provider(
                PROVIDER_NAME,
                format!("Rate limit exceeded. Please retry later. Status: {}", status),
            ),
            500..=599 => Error::provider(
                PROVIDER_NAME,
                format!("Bunny server error (transient): {} - {}", status, error_text),
            ),
            _ => Error::provider(
                PROVIDER_NAME,
                format!("{} failed: {} - {}", action, status, error_text),
            ),
        })
    }

    /// Find the zone for `domain`, records included
    async fn find_zone(&self, domain: &str) -> Result<Zone> {
        let request = self
            .request(Method::GET, "/dnszone")
            .query(&[("search", domain)]);
        let response = self.send(request, "Zone lookup").await?;

        let zones: ZoneList = response.json().await.map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("Failed to parse zone list: {}", e))
        })?;

        // search is a substring match, pick the exact zone
        zones
            .items
            .into_iter()
            .find(|z| z.domain.eq_ignore_ascii_case(domain))
            .ok_or_else(|| Error::provider(PROVIDER_NAME, format!("Zone not found: {}", domain)))
    }
}

#[async_trait]
impl DnsClient for BunnyClient {
    async fn get_records(&self, zone: &str) -> Result<Vec<Record>> {
        let domain = bare_zone(zone);
        let found = self.find_zone(domain).await?;

        debug!(
            "Bunny zone {} (id {}) has {} records",
            found.domain,
            found.id,
            found.records.len()
        );
        Ok(found.records.iter().map(BunnyRecord::to_record).collect())
    }

    async fn set_records(&self, zone: &str, records: &[Record]) -> Result<Vec<Record>> {
        let domain = bare_zone(zone);
        let found = self.find_zone(domain).await?;

        let mut written = Vec::with_capacity(records.len());
        for record in records {
            let type_code = code_for_type(&record.record_type).ok_or_else(|| {
                Error::invalid_input(format!(
                    "Record type {} is not supported by Bunny",
                    record.record_type
                ))
            })?;

            let body = RecordBody {
                record_type: type_code,
                name: to_bunny_name(&record.name),
                value: &record.content,
                ttl: record.ttl,
            };

            let existing = found.records.iter().find(|r| r.to_record().same_rrset(record));

            match existing {
                Some(existing) => {
                    info!(
                        "Updating Bunny record {} ({}) {} -> {}",
                        record.name, existing.id, existing.value, record.content
                    );
                    let path = format!("/dnszone/{}/records/{}", found.id, existing.id);
                    let request = self.request(Method::POST, &path).json(&body);
                    self.send(request, "Record update").await?;
                }
                None => {
                    info!(
                        "Adding Bunny record {} {} {}",
                        record.name, record.record_type, record.content
                    );
                    let path = format!("/dnszone/{}/records", found.id);
                    let request = self.request(Method::PUT, &path).json(&body);
                    self.send(request, "Record creation").await?;
                }
            }

            written.push(record.clone());
        }

        Ok(written)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating Bunny clients
pub struct BunnyFactory;

impl DnsClientFactory for BunnyFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsClient>> {
        match config {
            ProviderConfig::Bunny { api_key } => Ok(Box::new(BunnyClient::new(api_key.clone())?)),
            _ => Err(Error::config("Invalid config for Bunny provider")),
        }
    }
}

/// Register the Bunny client with a registry
///
/// # Example
///
/// ```rust
/// use sentinel_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// sentinel_provider_bunny::register(&registry);
/// assert!(registry.has_dns_client("bunny"));
/// ```
pub fn register(registry: &sentinel_core::ProviderRegistry) {
    registry.register_dns_client(PROVIDER_NAME, Box::new(BunnyFactory));
}
