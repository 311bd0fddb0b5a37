//! Application assembly: store selection, router and layers

use axum::{http::HeaderValue, middleware, Router};
use cmdb_core::{MemoryStore, SledStore, StoreError};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ServerConfig, StorageBackend, StorageConfig};
use crate::middleware::request_logging_middleware;
use crate::routes::{create_router, AppState};

/// Open the configured backend and build the shared state
pub fn build_state(storage: &StorageConfig) -> Result<AppState, StoreError> {
    let timeout = storage.timeout();
    let state = match storage.backend {
        StorageBackend::Memory => AppState::new(Arc::new(MemoryStore::new()), timeout),
        StorageBackend::Sled => {
            AppState::new(Arc::new(SledStore::open(&storage.path)?), timeout)
        }
    };

    tracing::info!(
        backend = %storage.backend,
        path = %storage.path.display(),
        timeout_ms = storage.timeout_ms,
        "Store opened"
    );
    Ok(state)
}

/// Router with logging, tracing and CORS layers installed
pub fn build_app(state: AppState, server: &ServerConfig) -> Router {
    create_router(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Resolves when the process is asked to stop
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Shutdown signal received");
}
