mod record;
mod request_logger;
mod tracing_sink;

pub use record::LogRecord;
pub use request_logger::RequestLogger;
pub use tracing_sink::TracingLogSink;
