use shared::config::Config;
use std::sync::Arc;
use tracing::warn;
use washbay::reporting::{TracingReporter, WebhookReporter};
use washbay::{
    CachePolicy, ErrorNormalizer, LogSink, Pipeline, ReportSink, RequestLogger, ResponseStore,
};

/// Server state shared across handlers and the pipeline middleware
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ResponseStore>,
        log_sink: Arc<dyn LogSink>,
        reporter: Arc<dyn ReportSink>,
    ) -> Self {
        let logger = RequestLogger::new(log_sink, config.slow_request_threshold);
        let normalizer = ErrorNormalizer::new(reporter, config.development, config.report_timeout);
        let policy = CachePolicy::from_settings(&config.cache);

        Self {
            pipeline: Arc::new(Pipeline::new(store, logger, normalizer, policy)),
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Arc<dyn ResponseStore> {
        self.pipeline.store()
    }
}

/// Webhook reporter when a collector URL is configured, tracing otherwise
pub fn reporter_from_config(config: &Config) -> Arc<dyn ReportSink> {
    match &config.report_url {
        Some(url) => match WebhookReporter::new(url.clone(), config.report_timeout) {
            Ok(reporter) => Arc::new(reporter),
            Err(e) => {
                warn!("Failed to build webhook reporter: {}. Reporting to logs instead.", e);
                Arc::new(TracingReporter)
            }
        },
        None => Arc::new(TracingReporter),
    }
}
