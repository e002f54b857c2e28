use crate::api::requests::InvalidateQuery;
use crate::api::responses::{CacheStatsResponse, InvalidateResponse};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use tracing::info;

/// GET /admin/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Result<Json<CacheStatsResponse>, ApiError> {
    let stats = state.store().stats().await?;
    let settings = &state.config.cache;

    Ok(Json(CacheStatsResponse::new(
        stats,
        settings.ttl.as_secs(),
        settings.max_entries,
    )))
}

/// DELETE /admin/cache?pattern=...
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Query(query): Query<InvalidateQuery>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let pattern = query.pattern.filter(|pattern| !pattern.is_empty());
    let removed = state.store().invalidate(pattern.as_deref()).await?;

    info!(
        "Invalidated {} cached responses (pattern: {})",
        removed,
        pattern.as_deref().unwrap_or("*")
    );

    Ok(Json(InvalidateResponse { removed, pattern }))
}
