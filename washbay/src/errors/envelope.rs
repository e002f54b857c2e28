use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The JSON body every failed request returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    /// RFC 3339 / ISO-8601, UTC
    pub timestamp: String,
    pub path: String,
    pub method: String,
    pub correlation_id: String,
    pub message: String,
    /// Only populated in development mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
