// shared/src/lib.rs

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("log sink: {0}")]
    LogSink(String),
    #[error("report sink: {0}")]
    ReportSink(String),
    /// Raised by response store backends; the in-process cache never fails
    #[error("cache store: {0}")]
    CacheStore(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
