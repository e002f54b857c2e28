use crate::ports::{LogContext, LogLevel, LogSink};
use serde_json::Value;
use shared::{Error, Result};
use tracing::{debug, error, info, warn};

/// Log sink backed by `tracing` events on the `washbay::http` target
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) -> Result<()> {
        let correlation_id = context
            .get("correlationId")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let rendered =
            serde_json::to_string(context).map_err(|e| Error::LogSink(e.to_string()))?;

        match level {
            LogLevel::Debug => {
                debug!(target: "washbay::http", correlation_id, context = %rendered, "{}", message)
            }
            LogLevel::Info => {
                info!(target: "washbay::http", correlation_id, context = %rendered, "{}", message)
            }
            LogLevel::Warn => {
                warn!(target: "washbay::http", correlation_id, context = %rendered, "{}", message)
            }
            LogLevel::Error => {
                error!(target: "washbay::http", correlation_id, context = %rendered, "{}", message)
            }
        }

        Ok(())
    }
}
