// Fault recovery policy and connection event reporting
use crate::application::connection_manager::{ConnectionError, ConnectionEvent, ConnectionManager};
use crate::application::staleness_watchdog::{FaultHandler, StalenessFault};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// Health reported at `/healthz` and `/status`
#[derive(Debug, Default)]
pub struct HealthState {
    degraded: AtomicBool,
}

impl HealthState {
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn mark_degraded(&self) {
        self.degraded.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.degraded.store(false, Ordering::SeqCst);
    }
}

/// Soft staleness reloads the session; hard staleness fails the health check
pub struct RecoveryPolicy {
    manager: ConnectionManager,
    health: Arc<HealthState>,
}

impl RecoveryPolicy {
    pub fn new(manager: ConnectionManager, health: Arc<HealthState>) -> Self {
        Self { manager, health }
    }

    fn reload(&self) {
        self.manager.disconnect();
        self.manager.reset_attempts();
        self.manager.connect();
    }
}

impl FaultHandler for RecoveryPolicy {
    fn on_fault(&self, fault: StalenessFault, lag: Duration) {
        match fault {
            StalenessFault::Soft => {
                tracing::warn!("Reloading telemetry session after {:?} without data", lag);
                self.reload();
            }
            StalenessFault::Hard => {
                tracing::error!(
                    "Telemetry wedged for {:?}, marking service degraded",
                    lag
                );
                self.health.mark_degraded();
            }
        }
    }

    fn on_healthy(&self, lag: Duration) {
        if self.health.is_degraded() {
            tracing::info!("Telemetry fresh again ({:?}), clearing degraded health", lag);
            self.health.clear();
        }
    }
}

/// Log connection conditions until the manager goes away
pub async fn report_connection_events(mut events: broadcast::Receiver<ConnectionEvent>) {
    loop {
        match events.recv().await {
            Ok(ConnectionEvent::Error(ConnectionError::MaxRetriesExceeded { attempts })) => {
                tracing::error!(
                    "Telemetry unavailable after {} attempts, waiting for a manual reconnect",
                    attempts
                );
            }
            Ok(ConnectionEvent::Error(err)) => tracing::warn!("Telemetry: {}", err),
            Ok(event) => tracing::debug!("Telemetry event: {:?}", event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Skipped {} telemetry events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::connection_machine::ConnectionState;
    use crate::application::connection_manager::ConnectionSettings;
    use crate::application::test_support::MockTransport;

    fn policy() -> (RecoveryPolicy, ConnectionManager, Arc<HealthState>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let manager = ConnectionManager::new(
            ConnectionSettings::new("ws://plant.test/ws"),
            transport.clone(),
        );
        let health = Arc::new(HealthState::default());
        let policy = RecoveryPolicy::new(manager.clone(), health.clone());
        (policy, manager, health, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_fault_reloads_session() {
        let (policy, manager, health, transport) = policy();
        let first = transport.push_socket();
        let mut events = manager.subscribe();

        manager.connect();
        while events.recv().await.unwrap() != ConnectionEvent::Connected {}
        let _second = transport.push_socket();

        policy.on_fault(StalenessFault::Soft, Duration::from_secs(31));

        assert_eq!(manager.state(), ConnectionState::Connecting);
        while events.recv().await.unwrap() != ConnectionEvent::Connected {}
        assert_eq!(transport.open_count(), 2);
        assert!(!health.is_degraded());
        drop(first);
    }

    #[tokio::test]
    async fn test_hard_fault_marks_degraded() {
        let (policy, manager, health, _transport) = policy();

        policy.on_fault(StalenessFault::Hard, Duration::from_secs(41));

        assert!(health.is_degraded());
        assert_eq!(manager.state(), ConnectionState::Closed);

        policy.on_healthy(Duration::from_secs(1));
        assert!(!health.is_degraded());
    }
}
