/// HTTP Server Module
///
/// Provides HTTP endpoints for checking worker health, viewing run counters,
/// and forcing an immediate evaluation tick.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::registry::InMemoryRegistry;
use crate::worker::{Worker, WorkerStatus};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<InMemoryRegistry>,
    pub worker: Arc<Worker>,
    pub status: Arc<RwLock<WorkerStatus>>,
}

/// Create and configure the HTTP server router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status_endpoint))
        .route("/run", post(run_endpoint))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "ok",
        "service": "dealwatch",
        "timestamp": Utc::now().to_rfc3339()
    })))
}

/// Worker counters and registry size
async fn status_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let status = state.status.read().await;

    Ok(Json(serde_json::json!({
        "worker": &*status,
        "registered_searches": state.registry.len().await
    })))
}

/// Force one evaluation tick
async fn run_endpoint(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    log::info!("Evaluation tick triggered via HTTP endpoint");

    match state.worker.tick().await {
        Ok(()) => Ok(Json(serde_json::json!({
            "status": "success"
        }))),
        Err(e) => {
            log::error!("Forced tick failed: {:#}", e);
            Ok(Json(serde_json::json!({
                "status": "error",
                "error": e.to_string()
            })))
        }
    }
}

/// Start the HTTP server
pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .context("Failed to bind HTTP server")?;

    log::info!("HTTP server listening on port {}", port);

    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}
