// Status poller - Periodic plant status check feeding the dashboard indicators
use crate::domain::plant_status::{PlantStatus, PlantStatusReport};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[async_trait]
pub trait PlantStatusSource: Send + Sync {
    /// Fetch the current plant status
    async fn fetch_status(&self) -> anyhow::Result<PlantStatus>;
}

pub struct StatusPoller {
    source: Arc<dyn PlantStatusSource>,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(source: Arc<dyn PlantStatusSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// One poll. Source failures read as `disconnected`.
    pub async fn poll_once(&self) -> PlantStatusReport {
        let status = match self.source.fetch_status().await {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!("Plant status poll failed: {:#}", e);
                PlantStatus::Disconnected
            }
        };
        PlantStatusReport::new(status, Utc::now())
    }

    /// Poll on a fixed interval, publishing every result
    pub fn spawn(self) -> (watch::Receiver<PlantStatusReport>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(PlantStatusReport::unknown());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let report = self.poll_once().await;

                let previous = tx.borrow().status;
                if previous != report.status {
                    tracing::info!("Plant status {:?} -> {:?}", previous, report.status);
                }
                if tx.send(report).is_err() {
                    tracing::debug!("No status subscribers left, stopping poller");
                    return;
                }
            }
        });

        (rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedSource {
        replies: Mutex<VecDeque<anyhow::Result<PlantStatus>>>,
    }

    impl ScriptedSource {
        fn new(replies: Vec<anyhow::Result<PlantStatus>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl PlantStatusSource for ScriptedSource {
        async fn fetch_status(&self) -> anyhow::Result<PlantStatus> {
            self.replies
                .lock()
                .pop_front()
                .unwrap_or(Ok(PlantStatus::Online))
        }
    }

    #[tokio::test]
    async fn test_poll_once_maps_failures_to_disconnected() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(PlantStatus::Offline),
            Err(anyhow::anyhow!("connection refused")),
        ]));
        let poller = StatusPoller::new(source, Duration::from_secs(10));

        assert_eq!(poller.poll_once().await.status, PlantStatus::Offline);
        let report = poller.poll_once().await;
        assert_eq!(report.status, PlantStatus::Disconnected);
        assert!(report.checked_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_poller_publishes_each_interval() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(PlantStatus::Offline),
            Ok(PlantStatus::Online),
        ]));
        let (mut rx, handle) = StatusPoller::new(source, Duration::from_secs(10)).spawn();

        assert_eq!(rx.borrow().status, PlantStatus::Disconnected);
        assert_eq!(rx.borrow().checked_at, None);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().status, PlantStatus::Offline);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().status, PlantStatus::Online);

        handle.abort();
    }
}
