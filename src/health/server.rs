// src/health/server.rs

//! HTTP endpoints for container health checks.
//!
//! - `GET /health`: 200 or 503 depending on log freshness
//! - `GET /status`: service health, local repository info, configuration
//!   summary
//! - anything else: 404

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{repository_info, service_health};
use crate::config::SyncConfig;
use crate::errors::Result;
use crate::exec::CommandRunner;
use crate::fs::FileSystem;

/// Shared, read-only state of the health server.
#[derive(Clone)]
pub struct HealthState {
    pub cfg: Arc<SyncConfig>,
    pub fs: Arc<dyn FileSystem>,
    pub runner: Arc<dyn CommandRunner>,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

/// Bind `0.0.0.0:port` and serve until `cancel` fires.
pub async fn serve(state: HealthState, port: u16, cancel: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "health check server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("health check server stopped");
    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Body and status code for `/health`.
pub fn health_response(state: &HealthState, now: SystemTime) -> (StatusCode, Value) {
    let health = service_health(
        state.fs.as_ref(),
        state.cfg.local.log_file.as_deref(),
        Duration::from_secs(state.cfg.health.stale_after_secs),
        now,
    );
    let code = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "status": if health.healthy { "healthy" } else { "unhealthy" },
        "message": health.message,
        "timestamp": unix_now(),
    });
    (code, body)
}

/// Body for `/status`.
pub async fn status_response(state: &HealthState, now: SystemTime) -> Value {
    let cfg = &state.cfg;
    let health = service_health(
        state.fs.as_ref(),
        cfg.local.log_file.as_deref(),
        Duration::from_secs(cfg.health.stale_after_secs),
        now,
    );
    let repository = repository_info(Arc::clone(&state.fs), state.runner.as_ref(), cfg).await;

    json!({
        "service": {
            "status": if health.healthy { "healthy" } else { "unhealthy" },
            "message": health.message,
        },
        "repository": repository,
        "environment": {
            "remote_host": cfg.remote.host,
            "sync_interval": cfg.sync.interval_secs,
            "bandwidth_limit": cfg.sync.bandwidth_limit,
        },
        "timestamp": unix_now(),
    })
}

async fn health_handler(State(state): State<HealthState>) -> (StatusCode, Json<Value>) {
    let (code, body) = health_response(&state, SystemTime::now());
    (code, Json(body))
}

async fn status_handler(State(state): State<HealthState>) -> Json<Value> {
    Json(status_response(&state, SystemTime::now()).await)
}

async fn not_found_handler() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
