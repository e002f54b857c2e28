use super::failure::HandlerError;
use serde_json::{Value, json};

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// How a handler failure is presented to the client
#[derive(Debug, Clone, PartialEq)]
pub enum FailureClass {
    /// Explicit status and message chosen by the handler
    Typed {
        status: u16,
        message: String,
        details: Option<Value>,
    },
    /// An error value without a status; always a 500
    Generic { message: String, details: Value },
    /// Not an error value at all
    Unknown,
}

impl FailureClass {
    pub fn status(&self) -> u16 {
        match self {
            FailureClass::Typed { status, .. } => *status,
            FailureClass::Generic { .. } | FailureClass::Unknown => 500,
        }
    }
}

/// Classify a failure, in priority order: typed, generic error, anything else.
///
/// A typed failure whose status is not an error status (outside 400..=599)
/// is treated as a generic error.
pub fn classify(failure: &HandlerError) -> FailureClass {
    match failure {
        HandlerError::Http(http) if (400..=599).contains(&http.status) => FailureClass::Typed {
            status: http.status,
            message: http.message.clone(),
            details: http.details.clone(),
        },
        HandlerError::Http(_) | HandlerError::Internal { .. } => FailureClass::Generic {
            message: failure.message(),
            details: json!({
                "name": failure.name(),
                "stack": failure.stack(),
            }),
        },
        HandlerError::Opaque(_) => FailureClass::Unknown,
    }
}
