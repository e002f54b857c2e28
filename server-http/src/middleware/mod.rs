pub mod pipeline;

pub use pipeline::{request_pipeline, CACHE_STATUS_HEADER, CORRELATION_ID_HEADER};
