use crate::error::ApiError;
use axum::http::{Method, Uri};

/// Any request no route matched
pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::not_found(format!("Cannot {} {}", method, uri.path()))
}
