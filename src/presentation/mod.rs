// Presentation layer - HTTP API for the dashboard UI
pub mod app_state;
pub mod handlers;
pub mod recovery;
