//! INWX JSON-RPC wire types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Command completed successfully
pub(crate) const CODE_SUCCESS: i64 = 1000;

/// Session no longer valid, log in again
pub(crate) const CODE_SESSION_EXPIRED: i64 = 1500;

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub method: &'a str,
    pub params: &'a Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(rename = "resData", default)]
    pub res_data: Option<Value>,
}

/// Record ID, numeric in production but echoed back verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// `resData` of `nameserver.info`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct InfoData {
    #[serde(default)]
    pub record: Vec<InwxRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InwxRecord {
    pub id: RecordId,
    /// Fully-qualified, apex records carry the bare domain
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub ttl: u32,
}

/// `resData` of `nameserver.createRecord`
#[derive(Debug, Deserialize)]
pub(crate) struct CreateData {
    pub id: RecordId,
}
