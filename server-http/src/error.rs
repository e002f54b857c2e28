use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::{Arc, Mutex};
use washbay::errors::classify;
use washbay::{HandlerError, HttpFailure};

/// Failure returned by a route handler.
///
/// The response it renders is a placeholder: the request pipeline middleware
/// picks the failure up from the response extensions and writes the envelope.
#[derive(Debug)]
pub struct ApiError(pub HandlerError);

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self(HttpFailure::not_found(message).into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(HttpFailure::bad_request(message).into())
    }
}

impl From<HandlerError> for ApiError {
    fn from(failure: HandlerError) -> Self {
        Self(failure)
    }
}

impl From<HttpFailure> for ApiError {
    fn from(failure: HttpFailure) -> Self {
        Self(failure.into())
    }
}

impl From<shared::Error> for ApiError {
    fn from(err: shared::Error) -> Self {
        Self(HandlerError::internal(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(classify(&self.0).status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = status.into_response();
        response.extensions_mut().insert(RaisedFailure::new(self.0));
        response
    }
}

/// Response extension carrying a handler failure to the pipeline middleware
#[derive(Clone, Debug)]
pub struct RaisedFailure(Arc<Mutex<Option<HandlerError>>>);

impl RaisedFailure {
    pub fn new(failure: HandlerError) -> Self {
        Self(Arc::new(Mutex::new(Some(failure))))
    }

    /// Take the failure out; later calls return `None`
    pub fn take(&self) -> Option<HandlerError> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_carries_failure_in_extensions() {
        let response = ApiError::bad_request("Invalid email").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let raised = response.extensions().get::<RaisedFailure>().unwrap();
        let failure = raised.take().unwrap();
        assert_eq!(failure.message(), "Invalid email");
        assert!(raised.take().is_none());
    }

    #[test]
    fn test_internal_errors_render_as_500() {
        let response = ApiError::from(shared::Error::CacheStore("offline".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
