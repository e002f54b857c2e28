use crate::domain::ResponsePayload;
use crate::errors::{HandlerError, ReportContext};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use shared::Result;
use storage_engine::StoreStats;

// Ports are the pluggable collaborators the pipeline talks to

/// Structured fields attached to a log line
pub type LogContext = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Port for writing request log lines
///
/// Implementations may fail; the request logger discards those failures.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) -> Result<()>;
}

/// Port for forwarding severe failures to an external reporting system
#[async_trait]
pub trait ReportSink: Send + Sync + 'static {
    async fn capture_exception(&self, error: &HandlerError, context: &ReportContext) -> Result<()>;
}

/// Port for the response cache
#[async_trait]
pub trait ResponseStore: Send + Sync + 'static {
    async fn lookup(&self, key: &str) -> Result<Option<ResponsePayload>>;
    async fn store(&self, key: &str, response: ResponsePayload) -> Result<()>;
    /// Remove all entries, or the entries whose key contains `pattern`
    async fn invalidate(&self, pattern: Option<&str>) -> Result<usize>;
    async fn stats(&self) -> Result<StoreStats>;
}
