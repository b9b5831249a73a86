use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Rejected start/stop transitions. These are the only failures surfaced to
/// operators; everything else is logged and absorbed by the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Monitoring is already running")]
    AlreadyRunning,

    #[error("Monitoring is not running")]
    AlreadyStopped,
}
