use crate::api::responses::HealthResponse;
use axum::{http::header, response::IntoResponse, Json};

/// GET /health
///
/// Marked `no-store` so liveness checks never see a cached answer.
pub async fn health_check() -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(HealthResponse {
            message: "OK".to_string(),
        }),
    )
}
