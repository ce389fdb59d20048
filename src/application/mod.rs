// Application layer - Connection lifecycle, watchdog, polling and grouping
pub mod connection_machine;
pub mod connection_manager;
pub mod staleness_watchdog;
pub mod status_poller;
pub mod three_phase_grouper;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;
