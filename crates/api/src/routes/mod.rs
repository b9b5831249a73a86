mod health;
mod monitor;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub use health::health_router;
pub use monitor::monitor_router;

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
