// Staleness watchdog - Detects telemetry that is no longer being delivered
use crate::application::connection_machine::ConnectionState;
use crate::application::connection_manager::ConnectionManager;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    pub interval: Duration,
    pub soft_threshold: Duration,
    pub hard_threshold: Duration,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            soft_threshold: Duration::from_secs(30),
            hard_threshold: Duration::from_secs(40),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StalenessFault {
    /// Upstream data stopped; reload the consuming context
    Soft,
    /// Open socket that yields nothing; escalate outside the connection
    Hard,
}

/// Recovery policy invoked when a fault is detected
pub trait FaultHandler: Send + Sync {
    fn on_fault(&self, fault: StalenessFault, lag: Duration);

    /// Called on every tick where the socket is open and data is fresh
    fn on_healthy(&self, _lag: Duration) {}
}

/// Threshold evaluation with per-tier sentinels.
///
/// Each tier fires once per fault episode. The soft tier only looks at the
/// lag, the hard tier also needs an open socket. An episode ends when the lag
/// drops back to the soft threshold.
#[derive(Debug, Clone)]
pub struct StalenessWatchdog {
    soft_threshold: Duration,
    hard_threshold: Duration,
    soft_fired: bool,
    hard_fired: bool,
}

impl StalenessWatchdog {
    pub fn new(settings: &WatchdogSettings) -> Self {
        Self {
            soft_threshold: settings.soft_threshold,
            hard_threshold: settings.hard_threshold,
            soft_fired: false,
            hard_fired: false,
        }
    }

    pub fn evaluate(&mut self, lag: Duration, connected: bool) -> Option<StalenessFault> {
        if connected && lag > self.hard_threshold {
            if self.hard_fired {
                return None;
            }
            self.hard_fired = true;
            self.soft_fired = true;
            Some(StalenessFault::Hard)
        } else if lag > self.soft_threshold {
            if self.soft_fired {
                return None;
            }
            self.soft_fired = true;
            Some(StalenessFault::Soft)
        } else {
            self.clear();
            None
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.soft_fired || self.hard_fired
    }

    fn clear(&mut self) {
        self.soft_fired = false;
        self.hard_fired = false;
    }
}

/// Run the watchdog on a fixed interval. Abort the handle to stop it.
pub fn spawn_watchdog(
    manager: ConnectionManager,
    handler: Arc<dyn FaultHandler>,
    settings: WatchdogSettings,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut watchdog = StalenessWatchdog::new(&settings);
        let mut ticker = tokio::time::interval(settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let connected = manager.state() == ConnectionState::Open;
            let lag = manager.lag(Instant::now()).unwrap_or_default();

            let Some(fault) = watchdog.evaluate(lag, connected) else {
                if connected && !watchdog.is_faulted() {
                    handler.on_healthy(lag);
                }
                continue;
            };

            match fault {
                StalenessFault::Soft => tracing::warn!(
                    "No telemetry from {} for {:?}, reloading",
                    manager.endpoint(),
                    lag
                ),
                StalenessFault::Hard => tracing::error!(
                    "Telemetry socket {} open but silent for {:?}",
                    manager.endpoint(),
                    lag
                ),
            }
            handler.on_fault(fault, lag);
        }
    })
}
