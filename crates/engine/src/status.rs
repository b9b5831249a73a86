use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::RwLock;

use common::{AlertHistoryEntry, MonitorState};

/// Number of recent alerts kept in memory for status queries.
pub const HISTORY_CAPACITY: usize = 50;

/// In-memory monitor state read by the status facade.
///
/// The monitor loop is the only writer (besides start/stop flipping `running`).
/// Each field is updated atomically on its own; readers may observe a mix of
/// old and new fields across one cycle.
#[derive(Debug)]
pub struct MonitorStatus {
    running: AtomicBool,
    /// f64 bits of the most recently observed price, any instrument.
    last_price: AtomicU64,
    prices: RwLock<HashMap<String, f64>>,
    last_update: RwLock<Option<String>>,
    history: RwLock<VecDeque<AlertHistoryEntry>>,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            last_price: AtomicU64::new(0f64.to_bits()),
            prices: RwLock::new(HashMap::new()),
            last_update: RwLock::new(None),
            history: RwLock::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }
}

impl MonitorStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> MonitorState {
        if self.is_running() {
            MonitorState::Running
        } else {
            MonitorState::Stopped
        }
    }

    /// Flip Stopped → Running. False if already running.
    pub(crate) fn try_set_running(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Flip Running → Stopped. False if already stopped.
    pub(crate) fn try_set_stopped(&self) -> bool {
        self.running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn current_price(&self) -> f64 {
        f64::from_bits(self.last_price.load(Ordering::SeqCst))
    }

    pub async fn price_of(&self, instrument: &str) -> Option<f64> {
        self.prices.read().await.get(instrument).copied()
    }

    pub async fn prices(&self) -> HashMap<String, f64> {
        self.prices.read().await.clone()
    }

    /// Local "HH:MM:SS" of the last observed price, or "Never".
    pub async fn last_update(&self) -> String {
        self.last_update
            .read()
            .await
            .clone()
            .unwrap_or_else(|| "Never".to_string())
    }

    pub async fn record_price(&self, instrument: &str, price: f64, at: String) {
        self.last_price.store(price.to_bits(), Ordering::SeqCst);
        self.prices.write().await.insert(instrument.to_string(), price);
        *self.last_update.write().await = Some(at);
    }

    /// Append an alert, evicting the oldest entries beyond `HISTORY_CAPACITY`.
    pub async fn push_alert(&self, entry: AlertHistoryEntry) {
        let mut history = self.history.write().await;
        history.push_back(entry);
        while history.len() > HISTORY_CAPACITY {
            history.pop_front();
        }
    }

    /// Oldest first.
    pub async fn recent_alerts(&self) -> Vec<AlertHistoryEntry> {
        self.history.read().await.iter().cloned().collect()
    }

    pub async fn alerts_count(&self) -> usize {
        self.history.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Direction;

    fn entry(n: usize) -> AlertHistoryEntry {
        AlertHistoryEntry {
            time: format!("10:{:02}", n % 60),
            index: "NIFTY 50".into(),
            direction: Direction::Up,
            movement: n as f64,
            price: 100.0 + n as f64,
            sent: true,
        }
    }

    #[tokio::test]
    async fn history_keeps_most_recent_fifty() {
        let status = MonitorStatus::new();
        for n in 0..60 {
            status.push_alert(entry(n)).await;
        }

        let alerts = status.recent_alerts().await;
        assert_eq!(alerts.len(), HISTORY_CAPACITY);
        assert_eq!(alerts.first().unwrap().movement, 10.0);
        assert_eq!(alerts.last().unwrap().movement, 59.0);
    }

    #[tokio::test]
    async fn last_update_defaults_to_never() {
        let status = MonitorStatus::new();
        assert_eq!(status.last_update().await, "Never");
        assert_eq!(status.current_price(), 0.0);
    }

    #[tokio::test]
    async fn record_price_updates_every_field() {
        let status = MonitorStatus::new();
        status.record_price("NIFTY 50", 22_150.5, "10:00:05".into()).await;
        status.record_price("BSE SENSEX", 73_000.0, "10:00:06".into()).await;

        assert_eq!(status.current_price(), 73_000.0);
        assert_eq!(status.price_of("NIFTY 50").await, Some(22_150.5));
        assert_eq!(status.last_update().await, "10:00:06");
    }

    #[test]
    fn running_flag_transitions_once() {
        let status = MonitorStatus::new();
        assert_eq!(status.state(), MonitorState::Stopped);
        assert!(status.try_set_running());
        assert!(!status.try_set_running());
        assert_eq!(status.state(), MonitorState::Running);
        assert!(status.try_set_stopped());
        assert!(!status.try_set_stopped());
    }
}
