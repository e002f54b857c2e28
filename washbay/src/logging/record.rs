use crate::domain::RequestMeta;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

/// Per-request log record opened when a request enters the pipeline
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub correlation_id: String,
    pub method: String,
    pub path: String,
    pub client_ip: String,
    pub user_agent: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    started: Instant,
}

impl LogRecord {
    pub fn open(request: &RequestMeta) -> Self {
        let correlation_id = request
            .correlation_id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            correlation_id,
            method: request.method.clone(),
            path: request.path.clone(),
            client_ip: request.client_ip(),
            user_agent: request.user_agent(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Milliseconds since the record was opened
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propagated_correlation_id_is_kept() {
        let request = RequestMeta::new("GET", "/search").with_header("x-correlation-id", "abc-123");
        let record = LogRecord::open(&request);

        assert_eq!(record.correlation_id, "abc-123");
        assert_eq!(record.path, "/search");
    }

    #[test]
    fn test_correlation_id_is_generated_when_missing() {
        let first = LogRecord::open(&RequestMeta::new("GET", "/"));
        let second = LogRecord::open(&RequestMeta::new("GET", "/"));

        assert!(Uuid::parse_str(&first.correlation_id).is_ok());
        assert_ne!(first.correlation_id, second.correlation_id);
    }

    #[test]
    fn test_serializes_camel_case_without_instant() {
        let request = RequestMeta::new("POST", "/bookings")
            .with_header("user-agent", "curl/8.0")
            .with_peer_addr("10.1.1.1");
        let value = serde_json::to_value(LogRecord::open(&request)).unwrap();

        assert_eq!(value["method"], "POST");
        assert_eq!(value["clientIp"], "10.1.1.1");
        assert_eq!(value["userAgent"], "curl/8.0");
        assert!(value.get("startedAt").is_some());
        assert!(value.get("started").is_none());
    }
}
