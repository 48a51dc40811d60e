//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use sendloop_core::config::ServerConfig;
use sendloop_core::traits::{MessageSender, RecordStore};
use sendloop_scheduler::SchedulerEngine;
use sendloop_whatsapp::MessageLog;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SchedulerEngine>,
    pub log: Arc<MessageLog>,
    pub sender: Arc<dyn MessageSender>,
    pub store: Arc<dyn RecordStore>,
    pub start_time: std::time::Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/scheduler/status", get(super::routes::scheduler_status))
        .route("/api/v1/scheduler/start", post(super::routes::scheduler_start))
        .route("/api/v1/scheduler/stop", post(super::routes::scheduler_stop))
        .route("/api/v1/scheduler/check", post(super::routes::scheduler_check))
        .route("/api/v1/scheduler/sync", post(super::routes::scheduler_sync))
        .route("/api/v1/scheduler/resync", post(super::routes::scheduler_resync))
        .route(
            "/api/v1/scheduler/stats/reset",
            post(super::routes::scheduler_reset_stats),
        )
        .route("/api/v1/logs", get(super::routes::recent_logs))
        .route("/api/v1/logs", delete(super::routes::clear_logs))
        .route("/api/v1/whatsapp/health", get(super::routes::whatsapp_health))
        .route("/api/v1/sheet/stats", get(super::routes::sheet_stats))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server.
pub async fn start(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
