use serde_json::Value;
use std::any::Any;
use std::fmt;

/// A failure a handler raises on purpose, with the status the client should see
#[derive(Debug, Clone, PartialEq)]
pub struct HttpFailure {
    pub status: u16,
    pub message: String,
    pub details: Option<Value>,
}

impl HttpFailure {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(413, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(422, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(503, message)
    }

    pub fn name(&self) -> &'static str {
        match self.status {
            400 => "BadRequest",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "NotFound",
            409 => "Conflict",
            413 => "PayloadTooLarge",
            422 => "UnprocessableEntity",
            429 => "TooManyRequests",
            500 => "InternalServerError",
            502 => "BadGateway",
            503 => "ServiceUnavailable",
            504 => "GatewayTimeout",
            _ => "HttpFailure",
        }
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

/// Anything a downstream handler can fail with
#[derive(Debug)]
pub enum HandlerError {
    /// Deliberate failure with an explicit status
    Http(HttpFailure),
    /// An error value without a status
    Internal { name: String, error: anyhow::Error },
    /// A failure that is not an error value, such as a panic payload
    Opaque(String),
}

impl HandlerError {
    /// Wrap any error value, remembering its type name.
    pub fn internal<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Internal {
            name: short_type_name(std::any::type_name::<E>()),
            error: error.into(),
        }
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let description = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Opaque(description)
    }

    pub fn name(&self) -> &str {
        match self {
            HandlerError::Http(failure) => failure.name(),
            HandlerError::Internal { name, .. } => name,
            HandlerError::Opaque(_) => "UnknownFailure",
        }
    }

    pub fn message(&self) -> String {
        match self {
            HandlerError::Http(failure) => failure.message.clone(),
            HandlerError::Internal { error, .. } => error.to_string(),
            HandlerError::Opaque(description) => description.clone(),
        }
    }

    /// Cause chain and backtrace (when captured) of an error value
    pub fn stack(&self) -> Option<String> {
        match self {
            HandlerError::Internal { error, .. } => Some(format!("{error:?}")),
            _ => None,
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Http(failure) => fmt::Display::fmt(failure, f),
            HandlerError::Internal { name, error } => write!(f, "{name}: {error}"),
            HandlerError::Opaque(description) => write!(f, "unknown failure: {description}"),
        }
    }
}

impl From<HttpFailure> for HandlerError {
    fn from(failure: HttpFailure) -> Self {
        HandlerError::Http(failure)
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(error: anyhow::Error) -> Self {
        HandlerError::Internal {
            name: "Error".to_string(),
            error,
        }
    }
}

fn short_type_name(full: &str) -> String {
    // "std::io::error::Error" -> "Error", keeping generic arguments intact
    let head = full.split('<').next().unwrap_or(full);
    let start = head.rfind("::").map(|i| i + 2).unwrap_or(0);
    full[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct QuoteUnavailable;

    impl fmt::Display for QuoteUnavailable {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "pricing service unavailable")
        }
    }

    impl std::error::Error for QuoteUnavailable {}

    #[test]
    fn test_internal_keeps_short_type_name() {
        let failure = HandlerError::internal(QuoteUnavailable);

        assert_eq!(failure.name(), "QuoteUnavailable");
        assert_eq!(failure.message(), "pricing service unavailable");
        assert!(failure.stack().unwrap().contains("pricing service unavailable"));
    }

    #[test]
    fn test_stack_includes_context_chain() {
        let failure = HandlerError::from(
            anyhow::Error::new(QuoteUnavailable).context("loading provider quote"),
        );

        assert_eq!(failure.message(), "loading provider quote");
        let stack = failure.stack().unwrap();
        assert!(stack.contains("loading provider quote"));
        assert!(stack.contains("pricing service unavailable"));
    }

    #[test]
    fn test_http_failure_details() {
        let failure = HttpFailure::bad_request("Invalid email")
            .with_details(json!({ "field": "email" }));

        assert_eq!(failure.status, 400);
        assert_eq!(failure.name(), "BadRequest");
        assert_eq!(failure.details, Some(json!({ "field": "email" })));
        assert_eq!(HandlerError::from(failure).stack(), None);
    }

    #[test]
    fn test_panic_payloads_become_opaque() {
        let failure = HandlerError::from_panic(Box::new("boom"));
        assert_eq!(failure.message(), "boom");
        assert_eq!(failure.name(), "UnknownFailure");

        let failure = HandlerError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(failure.message(), "owned boom");

        let failure = HandlerError::from_panic(Box::new(42_u32));
        assert_eq!(failure.message(), "non-string panic payload");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("Plain"), "Plain");
        assert_eq!(short_type_name("a::Wrapper<b::Inner>"), "Wrapper<b::Inner>");
    }
}
