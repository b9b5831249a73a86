use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, SystemClock};
use engine::{MarketHours, Monitor, MonitorDeps, MonitorSettings, RetryPolicy, YahooClient};
use ledger::SqliteLedger;
use telegram_ctrl::{start_bot, BotDeps, TelegramNotifier};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let instruments = cfg.instruments();
    info!(
        port = cfg.port,
        instruments = instruments.len(),
        timezone = %cfg.market_timezone,
        "IndexWatch starting"
    );

    // ── Database ──────────────────────────────────────────────────────────────
    let ledger = SqliteLedger::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to open ledger database: {e}"));

    // ── Collaborators ─────────────────────────────────────────────────────────
    let fetcher = YahooClient::new(Duration::from_secs(cfg.fetch_timeout_secs))
        .unwrap_or_else(|e| panic!("Failed to build market data client: {e}"));
    let notifier = TelegramNotifier::new(cfg.telegram_token.clone(), cfg.telegram_chat_id);

    // ── Monitor ───────────────────────────────────────────────────────────────
    let settings = MonitorSettings {
        instruments,
        market_hours: MarketHours::new(cfg.market_timezone, cfg.market_open, cfg.market_close),
        poll_interval: Duration::from_secs(cfg.poll_interval_secs),
        retry: RetryPolicy::new(
            cfg.notify_max_attempts,
            Duration::from_secs(cfg.notify_backoff_base_secs),
        ),
    };
    let monitor = Monitor::new(
        settings,
        MonitorDeps {
            fetcher: Arc::new(fetcher),
            ledger: Arc::new(ledger.clone()),
            notifier: Arc::new(notifier),
            clock: Arc::new(SystemClock),
        },
    );

    // ── Telegram commands (optional) ──────────────────────────────────────────
    if cfg.telegram_allowed_user_ids.is_empty() {
        info!("TELEGRAM_ALLOWED_USER_IDS not set, command bot disabled");
    } else {
        let bot_deps = BotDeps {
            monitor: monitor.clone(),
            allowed_user_ids: Arc::new(cfg.telegram_allowed_user_ids.clone()),
        };
        tokio::spawn(start_bot(cfg.telegram_token.clone(), bot_deps));
    }

    // ── Status API ────────────────────────────────────────────────────────────
    let api_state = api::AppState {
        monitor: monitor.clone(),
        ledger,
    };
    let port = cfg.port;
    match api::bind(port).await {
        Ok(listener) => {
            tokio::spawn(async move {
                if let Err(e) = api::serve(listener, api_state).await {
                    error!(port, error = %e, "Status API stopped");
                }
            });

            // ── Auto-start ────────────────────────────────────────────────────
            if cfg.auto_start {
                let delay = Duration::from_secs(cfg.auto_start_delay_secs);
                info!(?delay, "Auto-start scheduled");
                tokio::spawn(monitor.clone().auto_start(delay));
            }
        }
        Err(e) => {
            error!(port, error = %e, "Failed to bind status API, auto-start skipped");
        }
    }

    // Keep main alive
    info!("All subsystems started. Waiting for shutdown signal.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    if monitor.stop().is_ok() {
        info!("Monitoring stopped for shutdown");
    }
    info!("Shutdown signal received. Exiting.");
}
