use crate::errors::{HandlerError, ReportContext};
use crate::ports::ReportSink;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use shared::{Error, Result};
use std::time::Duration;
use tracing::error;

/// Drops every report
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

#[async_trait]
impl ReportSink for NoopReporter {
    async fn capture_exception(&self, _error: &HandlerError, _context: &ReportContext) -> Result<()> {
        Ok(())
    }
}

/// Writes reports as error events on the `washbay::report` target
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

#[async_trait]
impl ReportSink for TracingReporter {
    async fn capture_exception(&self, failure: &HandlerError, context: &ReportContext) -> Result<()> {
        let rendered = serde_json::to_string(context).map_err(|e| Error::ReportSink(e.to_string()))?;
        error!(
            target: "washbay::report",
            correlation_id = %context.correlation_id,
            error_name = failure.name(),
            stack = %failure.stack().unwrap_or_default(),
            context = %rendered,
            "{}", failure.message()
        );
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportPayload<'a> {
    timestamp: String,
    error: ReportedError<'a>,
    context: &'a ReportContext,
}

#[derive(Serialize)]
struct ReportedError<'a> {
    name: &'a str,
    message: String,
    stack: Option<String>,
}

/// POSTs each report as JSON to an HTTP collector
#[derive(Clone, Debug)]
pub struct WebhookReporter {
    client: reqwest::Client,
    url: String,
}

impl WebhookReporter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ReportSink(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReportSink for WebhookReporter {
    async fn capture_exception(&self, failure: &HandlerError, context: &ReportContext) -> Result<()> {
        let payload = ReportPayload {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            error: ReportedError {
                name: failure.name(),
                message: failure.message(),
                stack: failure.stack(),
            },
            context,
        };

        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::ReportSink(e.to_string()))?;

        Ok(())
    }
}
