use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::{AppState, APP_NAME};

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": APP_NAME,
        "status": "healthy",
        "dashboard": "available",
    }))
}

/// Liveness probe for deploy checks. Never fails; a dead database only flips `database`.
async fn health(State(state): State<AppState>) -> Json<Value> {
    let tz = state.monitor.settings().market_hours.timezone();
    let timestamp = state
        .monitor
        .now()
        .with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string();
    let database = if state.ledger.ping().await {
        "available"
    } else {
        "unavailable"
    };

    Json(json!({
        "status": "healthy",
        "timestamp": timestamp,
        "app": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "monitoring_ready": true,
    }))
}
