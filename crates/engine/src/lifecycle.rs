use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use common::{
    candle_id, AlertHistoryEntry, AlertRecord, CandleFetcher, CandleLedger, Clock, Instrument,
    LifecycleError, MonitorState, Notifier, ProcessedCandleRecord,
};

use crate::evaluator::evaluate;
use crate::message::{alert_message, startup_message};
use crate::{MarketHours, MonitorStatus, NotificationSink, RetryPolicy};

/// After a failed cycle the loop idles this many poll intervals.
const ERROR_BACKOFF_FACTOR: u32 = 3;

/// Immutable monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Evaluated in this order every cycle.
    pub instruments: Vec<Instrument>,
    pub market_hours: MarketHours,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            instruments: Instrument::defaults(),
            market_hours: MarketHours::nse(),
            poll_interval: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// External collaborators the monitor drives.
#[derive(Clone)]
pub struct MonitorDeps {
    pub fetcher: Arc<dyn CandleFetcher>,
    pub ledger: Arc<dyn CandleLedger>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    MarketClosed,
    /// One outcome per instrument, in configured order.
    Evaluated(Vec<InstrumentOutcome>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    /// Fetch failed or returned fewer than two candles.
    NoData,
    AlreadyProcessed { candle_id: String },
    Evaluated {
        candle_id: String,
        alerted: bool,
        delivered: bool,
    },
}

struct Shared {
    settings: MonitorSettings,
    deps: MonitorDeps,
    sink: NotificationSink,
    status: MonitorStatus,
    /// Bumped on every start; a loop exits once it no longer owns the current generation.
    generation: AtomicU64,
    /// Held for the duration of a cycle so cycles never overlap.
    cycle_lock: Mutex<()>,
}

/// Cloneable handle to the polling monitor, passed to the API and Telegram bot.
///
/// `start` and `stop` only flip the running flag (and on start spawn the
/// background loop). All fetching, evaluation and ledger writes happen on the
/// loop task.
#[derive(Clone)]
pub struct Monitor {
    shared: Arc<Shared>,
}

impl Monitor {
    pub fn new(settings: MonitorSettings, deps: MonitorDeps) -> Self {
        let sink = NotificationSink::new(deps.notifier.clone(), settings.retry);
        Self {
            shared: Arc::new(Shared {
                settings,
                deps,
                sink,
                status: MonitorStatus::new(),
                generation: AtomicU64::new(0),
                cycle_lock: Mutex::new(()),
            }),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.shared.settings
    }

    pub fn status(&self) -> &MonitorStatus {
        &self.shared.status
    }

    pub fn state(&self) -> MonitorState {
        self.shared.status.state()
    }

    pub fn is_running(&self) -> bool {
        self.shared.status.is_running()
    }

    pub fn current_price(&self) -> f64 {
        self.shared.status.current_price()
    }

    pub async fn last_update(&self) -> String {
        self.shared.status.last_update().await
    }

    pub async fn recent_alerts(&self) -> Vec<AlertHistoryEntry> {
        self.shared.status.recent_alerts().await
    }

    /// Current instant according to the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.shared.deps.clock.now()
    }

    /// Stopped → Running. Spawns the background loop; must be called inside a Tokio runtime.
    pub fn start(&self) -> Result<(), LifecycleError> {
        if !self.shared.status.try_set_running() {
            info!("Monitor already running");
            return Err(LifecycleError::AlreadyRunning);
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let instruments: Vec<&str> = self
            .shared
            .settings
            .instruments
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        info!(?instruments, generation, "Monitoring started");

        tokio::spawn(self.clone().run(generation));
        Ok(())
    }

    /// Running → Stopped. The loop notices at the top of its next cycle.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        if !self.shared.status.try_set_stopped() {
            info!("Monitor already stopped");
            return Err(LifecycleError::AlreadyStopped);
        }
        info!("Monitoring stopped");
        Ok(())
    }

    /// Wait `delay`, then start the monitor and announce it, unless an operator
    /// already started it.
    pub async fn auto_start(self, delay: Duration) {
        tokio::time::sleep(delay).await;

        if self.start().is_err() {
            return;
        }

        let now = self.shared.deps.clock.now();
        let message = startup_message(
            &self.shared.settings.instruments,
            &self.shared.settings.market_hours,
            now,
        );
        if self.shared.sink.deliver(&message).await {
            info!("Auto-monitoring started");
        } else {
            warn!("Auto-monitoring started but the startup notification was not delivered");
        }
    }

    fn owns(&self, generation: u64) -> bool {
        self.is_running() && self.shared.generation.load(Ordering::SeqCst) == generation
    }

    /// Background loop. Each cycle runs on its own task so a panic inside it is
    /// contained here instead of killing the loop.
    async fn run(self, generation: u64) {
        info!(generation, "Background monitoring loop running");
        let period = self.shared.settings.poll_interval;

        while self.owns(generation) {
            let cycle = {
                let monitor = self.clone();
                tokio::spawn(async move { monitor.run_cycle().await })
            };

            let pause = match cycle.await {
                Ok(report) => {
                    debug!(?report, "Cycle complete");
                    period
                }
                Err(e) => {
                    error!(error = %e, "Monitoring cycle failed, backing off");
                    period * ERROR_BACKOFF_FACTOR
                }
            };

            tokio::time::sleep(pause).await;
        }

        info!(generation, "Background monitoring loop exited");
    }

    /// Run one monitoring cycle across all instruments.
    pub async fn run_cycle(&self) -> CycleReport {
        let _guard = self.shared.cycle_lock.lock().await;

        let now = self.shared.deps.clock.now();
        if !self.shared.settings.market_hours.is_open(now) {
            info!("Market closed - monitoring paused");
            return CycleReport::MarketClosed;
        }

        let mut outcomes = Vec::with_capacity(self.shared.settings.instruments.len());
        for instrument in &self.shared.settings.instruments {
            outcomes.push(self.process_instrument(instrument).await);
        }
        CycleReport::Evaluated(outcomes)
    }

    async fn process_instrument(&self, instrument: &Instrument) -> InstrumentOutcome {
        let Shared {
            settings,
            deps,
            sink,
            status,
            ..
        } = &*self.shared;
        let tz = settings.market_hours.timezone();

        let candles = match deps.fetcher.fetch(&instrument.symbol).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!(instrument = %instrument.name, error = %e, "Fetch failed, skipping cycle");
                return InstrumentOutcome::NoData;
            }
        };

        let [.., settled, current] = candles.as_slice() else {
            debug!(instrument = %instrument.name, count = candles.len(), "Not enough candles");
            return InstrumentOutcome::NoData;
        };

        let updated_at = deps.clock.now().with_timezone(&tz).format("%H:%M:%S").to_string();
        status
            .record_price(&instrument.name, current.close, updated_at)
            .await;

        let id = candle_id(&instrument.name, current.timestamp, tz);
        if deps.ledger.has_processed(&id).await {
            debug!(candle_id = %id, "Candle already processed");
            return InstrumentOutcome::AlreadyProcessed { candle_id: id };
        }

        let eval = evaluate(settled.close, current.close, instrument.threshold);
        let local_time = current.timestamp.with_timezone(&tz);
        let mut delivered = false;

        if eval.should_alert {
            info!(
                instrument = %instrument.name,
                candle_id = %id,
                direction = %eval.direction,
                movement = eval.movement,
                price = current.close,
                "Threshold crossed"
            );

            let message = alert_message(
                instrument,
                eval.direction,
                eval.movement,
                current.close,
                current.timestamp,
                tz,
            );
            delivered = sink.deliver(&message).await;

            let alert = AlertRecord {
                candle_id: id.clone(),
                direction: eval.direction,
                movement: eval.magnitude(),
                price: current.close,
                instrument: instrument.name.clone(),
                timestamp: local_time.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
                delivery_sent: delivered,
            };
            deps.ledger.record_alert(&alert).await;
            status.push_alert(AlertHistoryEntry::from(&alert)).await;
        }

        deps.ledger
            .record_processed(&ProcessedCandleRecord {
                candle_id: id.clone(),
                timestamp: local_time.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
                instrument: instrument.name.clone(),
                price: current.close,
                movement: eval.movement,
                direction: eval.direction,
                alert_sent: eval.should_alert,
            })
            .await;

        InstrumentOutcome::Evaluated {
            candle_id: id,
            alerted: eval.should_alert,
            delivered,
        }
    }
}
