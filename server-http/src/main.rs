use axum::{extract::Request, ServiceExt};
use server_http::state::{reporter_from_config, AppState};
use server_http::routes;
use shared::config::{Config, LogFormat};
use std::net::SocketAddr;
use std::sync::Arc;
use storage_engine::spawn_sweeper;
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use washbay::response_store::response_cache;
use washbay::TracingLogSink;

#[tokio::main]
async fn main() {
    init_tracing(LogFormat::from_env());

    info!("Starting Washbay HTTP Server...");

    // Load environment variables from .env file (if exists)
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();
    let bind_address = config.bind_address();

    // Response cache, with an optional background sweep of expired entries
    let cache = Arc::new(response_cache(&config.cache));
    let _sweeper = (!config.cache.sweep_interval.is_zero())
        .then(|| spawn_sweeper(&cache, config.cache.sweep_interval));
    info!(
        "Response cache ready (ttl={:?}, max_entries={}, excluded={:?})",
        config.cache.ttl, config.cache.max_entries, config.cache.excluded_prefixes
    );

    let reporter = reporter_from_config(&config);
    if config.development {
        info!("Development mode: error details are included in responses");
    }

    let state = AppState::new(config, cache, Arc::new(TracingLogSink), reporter);
    let router = routes::build_router(state);

    // Trailing slashes are trimmed before routing
    let app = NormalizePathLayer::trim_trailing_slash().layer(router);

    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };

    info!("HTTP Server listening on http://{}", bind_address);
    info!("Try: curl -i http://localhost:{}/health", listener.local_addr().map(|a| a.port()).unwrap_or_default());

    let service = ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app);
    if let Err(e) = axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete.");
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
