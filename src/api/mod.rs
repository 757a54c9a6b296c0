pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::monitor::MonitorEngine;

pub fn router(engine: Arc<MonitorEngine>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/monitor/start", post(handlers::start_monitoring))
        .route("/api/v1/monitor/stop", post(handlers::stop_monitoring))
        .route("/api/v1/monitor/status", get(handlers::monitor_status))
        .route("/api/v1/monitor/addresses", post(handlers::add_address))
        .route(
            "/api/v1/monitor/addresses/{address}",
            delete(handlers::remove_address),
        )
        .route("/api/v1/analyze", post(handlers::analyze))
        .route("/api/v1/analyses", get(handlers::list_analyses))
        .route("/api/v1/stats", get(handlers::stats))
        .with_state(engine)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(engine: Arc<MonitorEngine>, host: &str, port: u16) -> eyre::Result<()> {
    let app = router(engine);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
