// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_status_source;
pub mod ws_transport;
