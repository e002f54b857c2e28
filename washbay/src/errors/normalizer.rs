use super::classify::{FailureClass, INTERNAL_ERROR_MESSAGE, classify};
use super::envelope::ErrorEnvelope;
use super::failure::HandlerError;
use crate::cache_key::query_pairs;
use crate::domain::RequestMeta;
use crate::logging::LogRecord;
use crate::ports::ReportSink;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;

/// Headers never forwarded to the reporting sink
const STRIPPED_HEADERS: [&str; 4] = ["authorization", "proxy-authorization", "cookie", "set-cookie"];

/// Request bodies larger than this are truncated in reports
const MAX_REPORTED_BODY_BYTES: usize = 8 * 1024;

/// Request context attached to a forwarded failure
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportContext {
    pub method: String,
    pub path: String,
    pub route: Option<String>,
    pub correlation_id: String,
    pub status_code: u16,
    pub query: BTreeMap<String, String>,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

impl ReportContext {
    pub fn from_request(request: &RequestMeta, correlation_id: &str, status_code: u16) -> Self {
        let headers = request
            .headers
            .iter()
            .filter(|(name, _)| {
                !STRIPPED_HEADERS
                    .iter()
                    .any(|stripped| name.eq_ignore_ascii_case(stripped))
            })
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();

        Self {
            method: request.method.clone(),
            path: request.path.clone(),
            route: request.route.clone(),
            correlation_id: correlation_id.to_string(),
            status_code,
            query: query_pairs(request.query.as_deref()).into_iter().collect(),
            body: reportable_body(&request.body),
            headers,
        }
    }
}

fn reportable_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    if body.len() <= MAX_REPORTED_BODY_BYTES {
        if let Ok(json) = serde_json::from_slice::<Value>(body) {
            return json;
        }
    }
    let end = body.len().min(MAX_REPORTED_BODY_BYTES);
    Value::String(String::from_utf8_lossy(&body[..end]).into_owned())
}

/// Status and envelope handed back to the transport
#[derive(Debug, Clone)]
pub struct NormalizedError {
    pub status: u16,
    pub envelope: ErrorEnvelope,
}

/// Terminal boundary turning handler failures into error envelopes
pub struct ErrorNormalizer {
    reporter: Arc<dyn ReportSink>,
    development: bool,
    report_timeout: Duration,
}

impl ErrorNormalizer {
    pub fn new(reporter: Arc<dyn ReportSink>, development: bool, report_timeout: Duration) -> Self {
        Self {
            reporter,
            development,
            report_timeout,
        }
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    /// Build the envelope for `failure` and forward server errors to the reporter.
    pub fn normalize(
        &self,
        failure: Arc<HandlerError>,
        request: &RequestMeta,
        record: &LogRecord,
    ) -> NormalizedError {
        let class = classify(&failure);
        let status = class.status();

        let (message, details) = match class {
            FailureClass::Typed {
                message, details, ..
            } => (
                message,
                details.unwrap_or_else(|| json!({ "name": failure.name() })),
            ),
            FailureClass::Generic { message, details } if self.development => (message, details),
            FailureClass::Generic { details, .. } => (INTERNAL_ERROR_MESSAGE.to_string(), details),
            FailureClass::Unknown => (
                INTERNAL_ERROR_MESSAGE.to_string(),
                json!({ "name": failure.name(), "value": failure.message() }),
            ),
        };

        let envelope = ErrorEnvelope {
            status_code: status,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            path: request.path.clone(),
            method: request.method.clone(),
            correlation_id: record.correlation_id.clone(),
            message,
            details: self.development.then_some(details),
        };

        if status >= 500 {
            let context = ReportContext::from_request(request, &record.correlation_id, status);
            self.report(failure, context);
        }

        NormalizedError { status, envelope }
    }

    fn report(&self, failure: Arc<HandlerError>, context: ReportContext) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                correlation_id = %context.correlation_id,
                "no async runtime available, dropping error report"
            );
            return;
        };

        let reporter = Arc::clone(&self.reporter);
        let timeout = self.report_timeout;

        runtime.spawn(async move {
            match tokio::time::timeout(timeout, reporter.capture_exception(&failure, &context)).await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    correlation_id = %context.correlation_id,
                    "failed to forward error report: {}", e
                ),
                Err(_) => warn!(
                    correlation_id = %context.correlation_id,
                    "error report timed out after {:?}", timeout
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HttpFailure;
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    struct ChannelReporter {
        tx: mpsc::UnboundedSender<(String, ReportContext)>,
    }

    #[async_trait]
    impl ReportSink for ChannelReporter {
        async fn capture_exception(
            &self,
            error: &HandlerError,
            context: &ReportContext,
        ) -> shared::Result<()> {
            let _ = self.tx.send((error.message(), context.clone()));
            Ok(())
        }
    }

    struct BrokenReporter;

    #[async_trait]
    impl ReportSink for BrokenReporter {
        async fn capture_exception(&self, _: &HandlerError, _: &ReportContext) -> shared::Result<()> {
            Err(shared::Error::ReportSink("sink offline".into()))
        }
    }

    struct HangingReporter;

    #[async_trait]
    impl ReportSink for HangingReporter {
        async fn capture_exception(&self, _: &HandlerError, _: &ReportContext) -> shared::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn channel_normalizer(
        development: bool,
    ) -> (ErrorNormalizer, mpsc::UnboundedReceiver<(String, ReportContext)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let normalizer = ErrorNormalizer::new(
            Arc::new(ChannelReporter { tx }),
            development,
            Duration::from_secs(1),
        );
        (normalizer, rx)
    }

    fn booking_request() -> RequestMeta {
        RequestMeta::new("POST", "/bookings")
            .with_query("provider=7")
            .with_route("/bookings")
            .with_header("Authorization", "Bearer secret")
            .with_header("cookie", "sid=abc")
            .with_header("content-type", "application/json")
            .with_body(r#"{"email":"nope"}"#)
    }

    #[tokio::test]
    async fn test_typed_client_error_is_passed_through_and_not_reported() {
        let (normalizer, mut rx) = channel_normalizer(false);
        let request = booking_request();
        let record = LogRecord::open(&request);

        let normalized = normalizer.normalize(
            Arc::new(HttpFailure::bad_request("Invalid email").into()),
            &request,
            &record,
        );

        assert_eq!(normalized.status, 400);
        assert_eq!(normalized.envelope.status_code, 400);
        assert_eq!(normalized.envelope.message, "Invalid email");
        assert_eq!(normalized.envelope.path, "/bookings");
        assert_eq!(normalized.envelope.method, "POST");
        assert_eq!(normalized.envelope.correlation_id, record.correlation_id);
        assert!(normalized.envelope.details.is_none());

        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_generic_error_in_production_hides_message_and_is_reported_once() {
        let (normalizer, mut rx) = channel_normalizer(false);
        let request = booking_request();
        let record = LogRecord::open(&request);

        let normalized = normalizer.normalize(
            Arc::new(anyhow::anyhow!("db pool exhausted").into()),
            &request,
            &record,
        );

        assert_eq!(normalized.status, 500);
        assert_eq!(normalized.envelope.message, INTERNAL_ERROR_MESSAGE);
        assert!(normalized.envelope.details.is_none());

        let (message, context) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message, "db pool exhausted");
        assert_eq!(context.correlation_id, record.correlation_id);
        assert_eq!(context.method, "POST");
        assert_eq!(context.route.as_deref(), Some("/bookings"));
        assert_eq!(context.query.get("provider").map(String::as_str), Some("7"));
        assert_eq!(context.body, json!({ "email": "nope" }));
        assert!(!context.headers.contains_key("authorization"));
        assert!(!context.headers.contains_key("cookie"));
        assert_eq!(
            context.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );

        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_development_mode_adds_details_for_every_class() {
        let (normalizer, _rx) = channel_normalizer(true);
        let request = RequestMeta::new("GET", "/search");
        let record = LogRecord::open(&request);

        let typed = normalizer.normalize(
            Arc::new(HttpFailure::not_found("Provider not found").into()),
            &request,
            &record,
        );
        assert_eq!(typed.envelope.details, Some(json!({ "name": "NotFound" })));

        let generic = normalizer.normalize(
            Arc::new(anyhow::anyhow!("db pool exhausted").into()),
            &request,
            &record,
        );
        assert_eq!(generic.envelope.message, "db pool exhausted");
        let details = generic.envelope.details.unwrap();
        assert_eq!(details["name"], "Error");
        assert!(details["stack"].is_string());

        let unknown =
            normalizer.normalize(Arc::new(HandlerError::Opaque("boom".into())), &request, &record);
        assert_eq!(unknown.envelope.message, INTERNAL_ERROR_MESSAGE);
        assert_eq!(unknown.envelope.details.unwrap()["name"], "UnknownFailure");
    }

    #[tokio::test]
    async fn test_typed_server_error_is_reported() {
        let (normalizer, mut rx) = channel_normalizer(false);
        let request = RequestMeta::new("GET", "/providers/3/quote");
        let record = LogRecord::open(&request);

        let normalized = normalizer.normalize(
            Arc::new(HttpFailure::service_unavailable("Pricing is down").into()),
            &request,
            &record,
        );

        assert_eq!(normalized.status, 503);
        assert_eq!(normalized.envelope.message, "Pricing is down");
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(matches!(received, Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_reporter_failures_do_not_affect_the_envelope() {
        let request = RequestMeta::new("GET", "/search");
        let record = LogRecord::open(&request);

        for reporter in [
            Arc::new(BrokenReporter) as Arc<dyn ReportSink>,
            Arc::new(HangingReporter) as Arc<dyn ReportSink>,
        ] {
            let normalizer = ErrorNormalizer::new(reporter, false, Duration::from_millis(20));
            let normalized = normalizer.normalize(
                Arc::new(anyhow::anyhow!("boom").into()),
                &request,
                &record,
            );
            assert_eq!(normalized.status, 500);
        }

        sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn test_normalize_without_runtime_still_builds_envelope() {
        let normalizer = ErrorNormalizer::new(Arc::new(BrokenReporter), false, Duration::from_secs(1));
        let request = RequestMeta::new("GET", "/search");
        let record = LogRecord::open(&request);

        let normalized = normalizer.normalize(
            Arc::new(HandlerError::Opaque("boom".into())),
            &request,
            &record,
        );

        assert_eq!(normalized.status, 500);
        assert_eq!(normalized.envelope.message, INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_oversized_json_body_is_truncated_as_text() {
        let large = format!(r#"{{"notes":"{}"}}"#, "x".repeat(MAX_REPORTED_BODY_BYTES));
        let request = RequestMeta::new("POST", "/bookings").with_body(large);
        let context = ReportContext::from_request(&request, "c-1", 500);

        let reported = context.body.as_str().unwrap();
        assert_eq!(reported.len(), MAX_REPORTED_BODY_BYTES);
        assert!(reported.starts_with(r#"{"notes":"xxx"#));
    }

    #[test]
    fn test_non_json_body_is_reported_as_text() {
        let request = RequestMeta::new("POST", "/upload").with_body("plain text");
        let context = ReportContext::from_request(&request, "c-1", 500);
        assert_eq!(context.body, json!("plain text"));
    }
}
