pub mod cache_key;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod ports;
pub mod reporting;
pub mod response_store;

pub use cache_key::{CachePolicy, cache_key};
pub use domain::{CacheStatus, RequestMeta, ResponsePayload};
pub use errors::{ErrorEnvelope, ErrorNormalizer, HandlerError, HttpFailure};
pub use logging::{LogRecord, RequestLogger, TracingLogSink};
pub use pipeline::{Pipeline, PipelineResponse};
pub use ports::{LogContext, LogLevel, LogSink, ReportSink, ResponseStore};
pub use response_store::ResponseCache;
