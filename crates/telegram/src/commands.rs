use std::sync::Arc;

use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

use common::LifecycleError;
use engine::Monitor;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub monitor: Monitor,
    pub allowed_user_ids: Arc<Vec<i64>>,
}

/// Telegram bot commands exposed to the operator.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "IndexWatch commands:")]
pub enum Command {
    #[command(description = "Start index monitoring")]
    Start,
    #[command(description = "Stop index monitoring")]
    Stop,
    #[command(description = "Show monitor status and last price")]
    Status,
    #[command(description = "List recent alerts")]
    Alerts,
}

/// Start the Telegram command bot in long-polling mode.
pub async fn start_bot(token: String, deps: BotDeps) {
    let bot = Bot::new(token);
    let deps = Arc::new(deps);

    info!("Telegram command bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_start))
        .branch(case![Command::Stop].endpoint(handle_stop))
        .branch(case![Command::Status].endpoint(handle_status))
        .branch(case![Command::Alerts].endpoint(handle_alerts));

    Update::filter_message()
        .filter_map(|msg: Message| msg.from().map(|u| u.id))
        .filter_async(auth_filter)
        .branch(command_handler)
}

/// Silently drop messages from users not in the allowed list.
async fn auth_filter(user_id: UserId, deps: Arc<BotDeps>) -> bool {
    let uid = user_id.0 as i64;
    let allowed = deps.allowed_user_ids.contains(&uid);
    if !allowed {
        warn!(user_id = uid, "Unauthorized Telegram access attempt");
    }
    allowed
}

async fn handle_start(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let reply = match deps.monitor.start() {
        Ok(()) => "Monitoring started.".to_string(),
        Err(LifecycleError::AlreadyRunning) => "Monitoring is already running.".to_string(),
        Err(e) => e.to_string(),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_stop(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let reply = match deps.monitor.stop() {
        Ok(()) => "Monitoring stopped.".to_string(),
        Err(LifecycleError::AlreadyStopped) => "Monitoring is already stopped.".to_string(),
        Err(e) => e.to_string(),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_status(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let text = status_text(&deps.monitor).await;
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_alerts(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let text = alerts_text(&deps.monitor, 10).await;
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub(crate) async fn status_text(monitor: &Monitor) -> String {
    let mut text = format!(
        "IndexWatch Status\n\
         Monitor: {}\n\
         Last update: {}\n",
        monitor.state(),
        monitor.last_update().await,
    );
    for instrument in &monitor.settings().instruments {
        match monitor.status().price_of(&instrument.name).await {
            Some(price) => text.push_str(&format!("{}: {price:.2}\n", instrument.name)),
            None => text.push_str(&format!("{}: no data\n", instrument.name)),
        }
    }
    text.push_str(&format!("Alerts in memory: {}", monitor.status().alerts_count().await));
    text
}

/// The `limit` most recent alerts, newest last.
pub(crate) async fn alerts_text(monitor: &Monitor, limit: usize) -> String {
    let alerts = monitor.recent_alerts().await;
    if alerts.is_empty() {
        return "No alerts yet.".to_string();
    }
    let skip = alerts.len().saturating_sub(limit);
    alerts
        .iter()
        .skip(skip)
        .map(|a| {
            let mark = if a.sent { "✅" } else { "❌" };
            format!(
                "{} {} {} {:.2} pts @ {:.2} {mark}",
                a.time, a.index, a.direction, a.movement, a.price
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
