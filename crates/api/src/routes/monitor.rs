use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use common::LifecycleError;

use crate::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 500;

pub fn monitor_router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/alerts", get(get_alerts))
        .route("/alerts/history", get(get_alert_history))
        .route("/start_monitoring", post(start_monitoring))
        .route("/start", post(start_monitoring))
        .route("/stop_monitoring", post(stop_monitoring))
}

// ─── Status ───────────────────────────────────────────────────────────────────

async fn get_status(State(state): State<AppState>) -> Json<Value> {
    let monitor = &state.monitor;
    let running = monitor.is_running();
    Json(json!({
        "running": running,
        "is_monitoring": running,
        "state": monitor.state().to_string(),
        "current_price": monitor.current_price(),
        "last_update": monitor.last_update().await,
        "alerts_count": monitor.status().alerts_count().await,
        "prices": monitor.status().prices().await,
    }))
}

// ─── Alerts ───────────────────────────────────────────────────────────────────

/// In-memory history, oldest first.
async fn get_alerts(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "alerts": state.monitor.recent_alerts().await }))
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

/// Persisted alerts, newest first.
async fn get_alert_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> (StatusCode, Json<Value>) {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    match state.ledger.recent_alerts(limit).await {
        Ok(alerts) => (
            StatusCode::OK,
            Json(json!({ "alerts": alerts, "limit": limit })),
        ),
        Err(e) => {
            error!(error = %e, "Failed to read alert history");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "alerts": [], "error": "Alert history unavailable" })),
            )
        }
    }
}

// ─── Lifecycle ────────────────────────────────────────────────────────────────

async fn start_monitoring(State(state): State<AppState>) -> Json<Value> {
    lifecycle_reply(state.monitor.start(), "Monitoring started successfully")
}

async fn stop_monitoring(State(state): State<AppState>) -> Json<Value> {
    lifecycle_reply(state.monitor.stop(), "Monitoring stopped successfully")
}

fn lifecycle_reply(result: Result<(), LifecycleError>, success: &str) -> Json<Value> {
    match result {
        Ok(()) => Json(json!({ "status": "success", "message": success })),
        Err(e) => Json(json!({ "status": "error", "message": e.to_string() })),
    }
}
