// # INWX DNS Client
//
// DNS client for the INWX domain robot (JSON-RPC over HTTPS).
//
// ## Session Handling
//
// INWX is session based: `account.login` sets a cookie that authenticates
// every later call. The client logs in lazily on first use and keeps the
// cookie in reqwest's cookie store. When a call answers with code 1500
// (session expired) the client logs in again and repeats the call exactly
// once. A second expiry is returned as `Error::SessionExpired`.
//
// Nothing else is retried here; the sentinel retries on the next
// leadership event.
//
// ## Security Requirements
//
// - Password NEVER appears in logs or Debug output
// - Provider MUST fail fast if user or password is empty
//
// ## API Reference
//
// - Read zone: `nameserver.info {domain}`
// - Overwrite record: `nameserver.updateRecord {id, content, ttl}`
// - Create record: `nameserver.createRecord {domain, name, type, content, ttl}`

mod rpc;

use async_trait::async_trait;
use rpc::{CODE_SESSION_EXPIRED, CODE_SUCCESS, CreateData, InfoData, InwxRecord, RpcRequest, RpcResponse};
use sentinel_core::config::ProviderConfig;
use sentinel_core::traits::dns_client::{absolute_name, bare_zone, relative_name};
use sentinel_core::traits::{DnsClient, DnsClientFactory, Record, RecordType};
use sentinel_core::{Error, Result};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Production JSON-RPC endpoint
pub const INWX_API_ENDPOINT: &str = "https://api.domrobot.com/jsonrpc/";

/// OT&E (sandbox) JSON-RPC endpoint
pub const INWX_SANDBOX_ENDPOINT: &str = "https://api.ote.domrobot.com/jsonrpc/";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "inwx";

/// INWX DNS client
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the password.
pub struct InwxClient {
    username: String,

    /// ⚠️ NEVER log this value
    password: String,

    endpoint: String,

    /// HTTP client with cookie store (holds the session cookie)
    client: reqwest::Client,

    /// Whether a login has succeeded since the last expiry
    ///
    /// The lock is held for a whole call so a re-login is never raced.
    logged_in: Mutex<bool>,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for InwxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InwxClient")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl InwxClient {
    /// Create a client for the production or sandbox endpoint
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        sandbox: bool,
    ) -> Result<Self> {
        let endpoint = if sandbox {
            INWX_SANDBOX_ENDPOINT
        } else {
            INWX_API_ENDPOINT
        };
        Self::with_endpoint(username, password, endpoint)
    }

    /// Create a client for an arbitrary JSON-RPC endpoint
    pub fn with_endpoint(
        username: impl Into<String>,
        password: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self> {
        let username = username.into();
        let password = password.into();

        if username.is_empty() || password.is_empty() {
            return Err(Error::config("INWX user and password are required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            username,
            password,
            endpoint: endpoint.into(),
            client,
            logged_in: Mutex::new(false),
        })
    }

    /// The JSON-RPC endpoint in use
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one JSON-RPC request, without any session handling
    async fn post(&self, method: &str, params: &Value) -> Result<RpcResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RpcRequest { method, params })
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", method, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!("{} rejected by INWX. Status: {}", method, status)),
                429 => Error::provider(
                    PROVIDER_NAME,
                    format!("Rate limit exceeded. Please retry later. Status: {}", status),
                ),
                500..=599 => Error::provider(
                    PROVIDER_NAME,
                    format!("INWX server error (transient): {} - {}", status, error_text),
                ),
                _ => Error::provider(
                    PROVIDER_NAME,
                    format!("{} failed: {} - {}", method, status, error_text),
                ),
            });
        }

        response.json::<RpcResponse>().await.map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("Failed to parse {} response: {}", method, e))
        })
    }

    async fn login(&self) -> Result<()> {
        debug!("Logging in to INWX as {}", self.username);

        let params = json!({
            "user": self.username,
            "pass": self.password,
        });
        let response = self.post("account.login", &params).await?;

        if response.code != CODE_SUCCESS {
            return Err(Error::auth(format!(
                "INWX login failed: {} (code {})",
                response.msg, response.code
            )));
        }

        Ok(())
    }

    /// Call `method` inside a session, re-logging in once on expiry
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let mut logged_in = self.logged_in.lock().await;

        if !*logged_in {
            self.login().await?;
            *logged_in = true;
        }

        let mut response = self.post(method, &params).await?;

        if response.code == CODE_SESSION_EXPIRED {
            warn!("INWX session expired during {}, logging in again", method);
            *logged_in = false;
            self.login().await?;
            *logged_in = true;

            response = self.post(method, &params).await?;
            if response.code == CODE_SESSION_EXPIRED {
                *logged_in = false;
                return Err(Error::session_expired(format!(
                    "{} still reports an expired session after logging in again",
                    method
                )));
            }
        }

        if response.code != CODE_SUCCESS {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{} failed: {} (code {})", method, response.msg, response.code),
            ));
        }

        serde_json::from_value(response.res_data.unwrap_or(Value::Null)).map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("Unexpected {} response: {}", method, e))
        })
    }

    async fn zone_info(&self, domain: &str) -> Result<Vec<InwxRecord>> {
        let data: Option<InfoData> = self
            .call("nameserver.info", json!({ "domain": domain }))
            .await?;
        Ok(data.unwrap_or_default().record)
    }
}

fn to_record(record: &InwxRecord, domain: &str) -> Record {
    let Ok(record_type) = record.record_type.parse::<RecordType>();
    Record {
        name: relative_name(&record.name, domain),
        record_type,
        content: record.content.clone(),
        ttl: record.ttl,
    }
}

#[async_trait]
impl DnsClient for InwxClient {
    async fn get_records(&self, zone: &str) -> Result<Vec<Record>> {
        let domain = bare_zone(zone);
        let records = self.zone_info(domain).await?;

        debug!("INWX returned {} records for {}", records.len(), domain);
        Ok(records.iter().map(|r| to_record(r, domain)).collect())
    }

    async fn set_records(&self, zone: &str, records: &[Record]) -> Result<Vec<Record>> {
        let domain = bare_zone(zone);
        let existing = self.zone_info(domain).await?;

        let mut written = Vec::with_capacity(records.len());
        for record in records {
            let current = existing
                .iter()
                .find(|e| to_record(e, domain).same_rrset(record));

            match current {
                Some(current) => {
                    info!(
                        "Updating INWX record {} ({}) {} -> {}",
                        absolute_name(&record.name, domain),
                        current.id,
                        current.content,
                        record.content
                    );
                    let _: IgnoredAny = self
                        .call(
                            "nameserver.updateRecord",
                            json!({
                                "id": current.id,
                                "content": record.content,
                                "ttl": record.ttl,
                            }),
                        )
                        .await?;
                }
                None => {
                    info!(
                        "Creating INWX record {} {} {}",
                        absolute_name(&record.name, domain),
                        record.record_type,
                        record.content
                    );
                    let created: CreateData = self
                        .call(
                            "nameserver.createRecord",
                            json!({
                                "domain": domain,
                                "name": absolute_name(&record.name, domain),
                                "type": record.record_type.to_string(),
                                "content": record.content,
                                "ttl": record.ttl,
                            }),
                        )
                        .await?;
                    debug!("Created INWX record with id {}", created.id);
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

/// Factory for creating INWX clients
pub struct InwxFactory;

impl DnsClientFactory for InwxFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsClient>> {
        match config {
            ProviderConfig::Inwx {
                username,
                password,
                sandbox,
            } => {
                if *sandbox {
                    warn!("INWX client using the OT&E sandbox - production records are not touched");
                }

                Ok(Box::new(InwxClient::new(
                    username.clone(),
                    password.clone(),
                    *sandbox,
                )?))
            }
            _ => Err(Error::config("Invalid config for INWX provider")),
        }
    }
}

/// Register the INWX client with a registry
///
/// # Example
///
/// ```rust
/// use sentinel_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// sentinel_provider_inwx::register(&registry);
/// assert!(registry.has_dns_client("inwx"));
/// ```
pub fn register(registry: &sentinel_core::ProviderRegistry) {
    registry.register_dns_client(PROVIDER_NAME, Box::new(InwxFactory));
}
