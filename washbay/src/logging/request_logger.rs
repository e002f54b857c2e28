use super::record::LogRecord;
use crate::domain::{CacheStatus, RequestMeta};
use crate::errors::HandlerError;
use crate::ports::{LogContext, LogLevel, LogSink};
use serde_json::{Value, json};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Writes one opening line and exactly one terminal line per request
pub struct RequestLogger {
    sink: Arc<dyn LogSink>,
    slow_threshold: Duration,
}

impl RequestLogger {
    pub fn new(sink: Arc<dyn LogSink>, slow_threshold: Duration) -> Self {
        Self {
            sink,
            slow_threshold,
        }
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    /// Open the record for `request` and emit the "incoming request" line.
    pub fn begin(&self, request: &RequestMeta) -> LogRecord {
        let record = LogRecord::open(request);
        let mut context = record_context(&record);
        if let Some(query) = &request.query {
            context.insert("query".into(), json!(query));
        }
        self.emit(LogLevel::Info, "incoming request", &context);
        record
    }

    pub fn finish_success(
        &self,
        record: &LogRecord,
        status_code: u16,
        duration_ms: u64,
        response_size_bytes: usize,
        cache: CacheStatus,
    ) {
        let mut context = record_context(record);
        context.insert("statusCode".into(), json!(status_code));
        context.insert("durationMs".into(), json!(duration_ms));
        context.insert("responseSizeBytes".into(), json!(response_size_bytes));
        context.insert("cache".into(), json!(cache));
        self.emit(LogLevel::Info, "request completed", &context);

        if duration_ms > self.threshold_ms() {
            let context = LogContext::from_iter([
                ("event".to_string(), json!("performance")),
                ("correlationId".to_string(), json!(record.correlation_id)),
                ("method".to_string(), json!(record.method)),
                ("path".to_string(), json!(record.path)),
                ("durationMs".to_string(), json!(duration_ms)),
                ("thresholdMs".to_string(), json!(self.threshold_ms())),
            ]);
            self.emit(LogLevel::Warn, "slow request", &context);
        }
    }

    pub fn finish_error(
        &self,
        record: &LogRecord,
        failure: &HandlerError,
        status_code: u16,
        duration_ms: u64,
    ) {
        let mut context = record_context(record);
        context.insert("statusCode".into(), json!(status_code));
        context.insert("durationMs".into(), json!(duration_ms));
        context.insert("errorName".into(), json!(failure.name()));
        context.insert("errorMessage".into(), json!(failure.message()));
        context.insert(
            "errorStack".into(),
            failure.stack().map(Value::String).unwrap_or(Value::Null),
        );
        self.emit(LogLevel::Error, "request failed", &context);
    }

    /// Terminal record for a request whose future was dropped before it resolved.
    pub fn finish_cancelled(&self, record: &LogRecord, duration_ms: u64) {
        let mut context = record_context(record);
        context.insert("statusCode".into(), json!(499));
        context.insert("durationMs".into(), json!(duration_ms));
        context.insert("errorName".into(), json!("Cancelled"));
        context.insert(
            "errorMessage".into(),
            json!("request was cancelled before completion"),
        );
        context.insert("errorStack".into(), Value::Null);
        self.emit(LogLevel::Error, "request cancelled", &context);
    }

    fn threshold_ms(&self) -> u64 {
        u64::try_from(self.slow_threshold.as_millis()).unwrap_or(u64::MAX)
    }

    fn emit(&self, level: LogLevel, message: &str, context: &LogContext) {
        // Sink errors and panics are dropped: logging never fails a request
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = self.sink.log(level, message, context);
        }));
    }
}

fn record_context(record: &LogRecord) -> LogContext {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => LogContext::from_iter([(
            "correlationId".to_string(),
            json!(record.correlation_id),
        )]),
    }
}
