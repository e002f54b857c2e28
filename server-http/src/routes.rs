use crate::handlers;
use crate::middleware::request_pipeline;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the router with only the built-in endpoints
pub fn build_router(state: AppState) -> Router {
    build_router_with(state, Router::new())
}

/// Build the router, mounting `api` behind the request pipeline next to the
/// health and cache monitoring endpoints
pub fn build_router_with(state: AppState, api: Router<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Cache monitoring
        .route("/admin/cache/stats", get(handlers::cache_stats))
        .route("/admin/cache", delete(handlers::invalidate_cache))
        .merge(api)
        .fallback(handlers::not_found)
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), request_pipeline))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
