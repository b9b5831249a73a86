pub mod routes;

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use engine::Monitor;
use ledger::SqliteLedger;

pub const APP_NAME: &str = "IndexWatch";

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Monitor,
    pub ledger: SqliteLedger,
}

/// Full router with CORS, ready to serve or to drive from tests.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::health_router())
        .merge(routes::monitor_router())
        .fallback(routes::not_found)
        .with_state(state)
        .layer(cors)
}

/// Bind `0.0.0.0:port`. Once this returns the API is reachable.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Status API listening");
    Ok(listener)
}

/// Serve the status API on a bound listener until the process exits.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}
