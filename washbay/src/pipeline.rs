//! Request pipeline: logging, response caching and error normalization
//! around a single downstream handler call.

use crate::cache_key::{CachePolicy, cache_key};
use crate::domain::{CacheStatus, RequestMeta, ResponsePayload};
use crate::errors::{ErrorEnvelope, ErrorNormalizer, HandlerError};
use crate::logging::{LogRecord, RequestLogger};
use crate::ports::ResponseStore;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::warn;

/// What the transport writes back to the client
#[derive(Debug, Clone)]
pub enum PipelineResponse {
    Success {
        correlation_id: String,
        payload: ResponsePayload,
        cache: CacheStatus,
    },
    Failure {
        correlation_id: String,
        status: u16,
        envelope: ErrorEnvelope,
    },
}

impl PipelineResponse {
    pub fn status(&self) -> u16 {
        match self {
            PipelineResponse::Success { payload, .. } => payload.status,
            PipelineResponse::Failure { status, .. } => *status,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            PipelineResponse::Success { correlation_id, .. }
            | PipelineResponse::Failure { correlation_id, .. } => correlation_id,
        }
    }
}

/// Composes the response store, request logger and error normalizer
pub struct Pipeline {
    store: Arc<dyn ResponseStore>,
    logger: RequestLogger,
    normalizer: ErrorNormalizer,
    policy: CachePolicy,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ResponseStore>,
        logger: RequestLogger,
        normalizer: ErrorNormalizer,
        policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            logger,
            normalizer,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn ResponseStore> {
        &self.store
    }

    /// Run `handler` for `request`, unless a fresh cached response exists.
    ///
    /// Every call produces exactly one terminal log record, including when the
    /// returned future is dropped before it completes.
    pub async fn handle<F, Fut>(&self, request: RequestMeta, handler: F) -> PipelineResponse
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResponsePayload, HandlerError>>,
    {
        let record = self.logger.begin(&request);
        let mut terminal = TerminalRecord::new(&self.logger, record);

        let key = self
            .policy
            .is_cacheable(&request.method, &request.path)
            .then(|| cache_key(&request.method, &request.path, request.query.as_deref()));

        if let Some(key) = &key {
            match self.store.lookup(key).await {
                Ok(Some(payload)) => {
                    terminal.success(payload.status, payload.size(), CacheStatus::Hit);
                    return PipelineResponse::Success {
                        correlation_id: terminal.correlation_id().to_string(),
                        payload,
                        cache: CacheStatus::Hit,
                    };
                }
                Ok(None) => {}
                Err(e) => warn!(
                    correlation_id = %terminal.correlation_id(),
                    "response cache lookup failed, treating as miss: {}", e
                ),
            }
        }

        // Panics raised while building or polling the handler future are failures too
        let outcome = AssertUnwindSafe(async move { handler().await })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(HandlerError::from_panic(panic)));

        match outcome {
            Ok(payload) => {
                let cache = match &key {
                    Some(key) if payload.is_storable() => {
                        if let Err(e) = self.store.store(key, payload.clone()).await {
                            warn!(
                                correlation_id = %terminal.correlation_id(),
                                "failed to store response in cache: {}", e
                            );
                        }
                        CacheStatus::Miss
                    }
                    // Cacheable request, but the handler's response must not be shared
                    Some(_) | None => CacheStatus::Bypass,
                };

                terminal.success(payload.status, payload.size(), cache);
                PipelineResponse::Success {
                    correlation_id: terminal.correlation_id().to_string(),
                    payload,
                    cache,
                }
            }
            Err(failure) => {
                let failure = Arc::new(failure);
                let normalized =
                    self.normalizer
                        .normalize(Arc::clone(&failure), &request, terminal.record());

                terminal.error(&failure, normalized.status);
                PipelineResponse::Failure {
                    correlation_id: terminal.correlation_id().to_string(),
                    status: normalized.status,
                    envelope: normalized.envelope,
                }
            }
        }
    }
}

/// Holds the open log record and guarantees one terminal line for it
struct TerminalRecord<'a> {
    logger: &'a RequestLogger,
    record: LogRecord,
    finished: bool,
}

impl<'a> TerminalRecord<'a> {
    fn new(logger: &'a RequestLogger, record: LogRecord) -> Self {
        Self {
            logger,
            record,
            finished: false,
        }
    }

    fn record(&self) -> &LogRecord {
        &self.record
    }

    fn correlation_id(&self) -> &str {
        &self.record.correlation_id
    }

    fn success(&mut self, status: u16, size: usize, cache: CacheStatus) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        self.logger
            .finish_success(&self.record, status, self.record.elapsed_ms(), size, cache);
    }

    fn error(&mut self, failure: &HandlerError, status: u16) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        self.logger
            .finish_error(&self.record, failure, status, self.record.elapsed_ms());
    }
}

impl Drop for TerminalRecord<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.logger
                .finish_cancelled(&self.record, self.record.elapsed_ms());
        }
    }
}
