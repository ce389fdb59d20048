// Plant telemetry core - live connection management and three-phase grouping
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
