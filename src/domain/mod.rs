// Domain layer - Live readings, data point metadata and grouping models
pub mod data_point;
pub mod live_value;
pub mod plant_status;
pub mod three_phase;
