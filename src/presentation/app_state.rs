// Application state for HTTP handlers
use crate::application::connection_manager::ConnectionManager;
use crate::domain::data_point::DataPointDescriptor;
use crate::domain::plant_status::PlantStatusReport;
use crate::presentation::recovery::HealthState;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub manager: ConnectionManager,
    pub data_points: Arc<Vec<DataPointDescriptor>>,
    pub plant_status: watch::Receiver<PlantStatusReport>,
    pub health: Arc<HealthState>,
}
