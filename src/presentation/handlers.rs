// HTTP request handlers
use crate::application::connection_manager::{ConnectionError, ConnectionSnapshot};
use crate::application::three_phase_grouper::group_points;
use crate::domain::data_point::DataPointDescriptor;
use crate::domain::live_value::{LiveValue, LiveValueStore};
use crate::domain::plant_status::PlantStatusReport;
use crate::domain::three_phase::GroupingResult;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct LayoutQuery {
    /// Comma separated point ids, in display order
    pub points: Option<String>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub connection: ConnectionSnapshot,
    pub plant: PlantStatusReport,
    pub degraded: bool,
}

/// Health check endpoint, degraded after a hard staleness fault
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state.health.is_degraded() {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    }
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connection: state.manager.snapshot(),
        plant: state.plant_status.borrow().clone(),
        degraded: state.health.is_degraded(),
    })
}

/// Current live values
pub async fn get_live(State(state): State<Arc<AppState>>) -> Json<LiveValueStore> {
    Json(state.manager.values())
}

/// Live values as server-sent events, one snapshot per store change
pub async fn stream_live(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.manager.store();

    let stream = async_stream::stream! {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            match Event::default().event("live").json_data(&snapshot) {
                Ok(event) => yield Ok::<_, Infallible>(event),
                Err(e) => tracing::warn!("Failed to encode live snapshot: {}", e),
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Group the displayed points for rendering
pub async fn get_layout(
    Query(query): Query<LayoutQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<GroupingResult> {
    let displayed = select_points(&state.data_points, query.points.as_deref());
    Json(group_points(&displayed))
}

/// Write a value to a data point
pub async fn send_command(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<StatusCode, (StatusCode, String)> {
    if !state.data_points.iter().any(|p| p.id == id) {
        return Err((StatusCode::NOT_FOUND, format!("unknown data point '{}'", id)));
    }

    let value = LiveValue::from_json(body).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "command value must be a JSON scalar".to_string(),
        )
    })?;

    match state.manager.send(&id, value) {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(ConnectionError::NotConnected) => {
            state.manager.connect();
            Err((StatusCode::CONFLICT, ConnectionError::NotConnected.to_string()))
        }
        Err(e) => Err((StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

/// Points named in `ids`, in that order; every configured point when absent
fn select_points(all: &[DataPointDescriptor], ids: Option<&str>) -> Vec<DataPointDescriptor> {
    let Some(ids) = ids else {
        return all.to_vec();
    };

    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .filter_map(|id| {
            let point = all.iter().find(|p| p.id == id);
            if point.is_none() {
                tracing::debug!("Layout requested unknown point {}", id);
            }
            point.cloned()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::connection_machine::ConnectionState;
    use crate::application::connection_manager::{
        ConnectionEvent, ConnectionManager, ConnectionSettings,
    };
    use crate::application::staleness_watchdog::{
        FaultHandler, StalenessFault, WatchdogSettings, spawn_watchdog,
    };
    use crate::application::test_support::MockTransport;
    use crate::domain::data_point::UiKind;
    use crate::presentation::recovery::{HealthState, RecoveryPolicy};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::watch;

    fn app_state(transport: &Arc<MockTransport>) -> Arc<AppState> {
        let manager = ConnectionManager::new(
            ConnectionSettings::new("ws://plant.test/ws"),
            transport.clone(),
        );
        let (_status_tx, plant_status) = watch::channel(PlantStatusReport::unknown());

        Arc::new(AppState {
            manager,
            data_points: Arc::new(vec![
                DataPointDescriptor::new("grid_relay", "Grid Relay", UiKind::Switch),
                DataPointDescriptor::new("battery_soc", "Battery SOC", UiKind::Gauge),
            ]),
            plant_status,
            health: Arc::new(HealthState::default()),
        })
    }

    async fn wait_connected(manager: &ConnectionManager) {
        let mut events = manager.subscribe();
        manager.connect();
        while events.recv().await.unwrap() != ConnectionEvent::Connected {}
    }

    #[test]
    fn test_select_points() {
        let all = vec![
            DataPointDescriptor::new("a", "A", UiKind::Display),
            DataPointDescriptor::new("b", "B", UiKind::Gauge),
            DataPointDescriptor::new("c", "C", UiKind::Switch),
        ];

        assert_eq!(select_points(&all, None).len(), 3);

        let ids: Vec<_> = select_points(&all, Some("c, a,missing,"))
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_to_unknown_point() {
        let state = app_state(&Arc::new(MockTransport::new()));

        let (status, _) = send_command(
            Path("inverter_mode".to_string()),
            State(state.clone()),
            Json(json!(true)),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.manager.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_rejects_non_scalar_body() {
        let state = app_state(&Arc::new(MockTransport::new()));

        let (status, _) = send_command(
            Path("grid_relay".to_string()),
            State(state),
            Json(json!({"on": true})),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_while_disconnected_triggers_reconnect() {
        let state = app_state(&Arc::new(MockTransport::new()));

        let (status, _) = send_command(
            Path("grid_relay".to_string()),
            State(state.clone()),
            Json(json!(true)),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(state.manager.state(), ConnectionState::Connecting);
        state.manager.disconnect();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_command_writes_to_open_socket() {
        let transport = Arc::new(MockTransport::new());
        let mut server = transport.push_socket();
        let state = app_state(&transport);
        wait_connected(&state.manager).await;

        let status = send_command(
            Path("grid_relay".to_string()),
            State(state.clone()),
            Json(json!(false)),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(
            server.next_sent().await.as_deref(),
            Some(r#"{"grid_relay":false}"#)
        );
        state.manager.disconnect();
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_degraded_until_data_is_fresh() {
        let transport = Arc::new(MockTransport::new());
        let server = transport.push_socket();
        let state = app_state(&transport);
        let policy = Arc::new(RecoveryPolicy::new(
            state.manager.clone(),
            state.health.clone(),
        ));
        policy.on_fault(StalenessFault::Hard, Duration::from_secs(41));

        let watchdog = spawn_watchdog(
            state.manager.clone(),
            policy.clone(),
            WatchdogSettings::default(),
        );

        // No open socket yet, nothing clears the flag
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            health_check(State(state.clone())).await,
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        );
        assert!(get_status(State(state.clone())).await.0.degraded);

        wait_connected(&state.manager).await;
        server.frame(r#"{"battery_soc": 71}"#);
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(
            health_check(State(state.clone())).await,
            (StatusCode::OK, "ok")
        );
        let status = get_status(State(state.clone())).await.0;
        assert!(!status.degraded);
        assert_eq!(status.connection.state, ConnectionState::Open);

        watchdog.abort();
        state.manager.disconnect();
    }
}
