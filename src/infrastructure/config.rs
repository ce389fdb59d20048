use crate::application::connection_manager::ConnectionSettings;
use crate::application::staleness_watchdog::WatchdogSettings;
use crate::domain::data_point::DataPointDescriptor;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct PlantConfig {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    pub status: Option<StatusConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    pub endpoint: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchdogConfig {
    #[serde(default = "default_watchdog_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_soft_threshold_ms")]
    pub soft_threshold_ms: u64,
    #[serde(default = "default_hard_threshold_ms")]
    pub hard_threshold_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    pub url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataPointsConfig {
    #[serde(default)]
    pub points: Vec<DataPointDescriptor>,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_watchdog_interval_ms() -> u64 {
    2_000
}

fn default_soft_threshold_ms() -> u64 {
    30_000
}

fn default_hard_threshold_ms() -> u64 {
    40_000
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_watchdog_interval_ms(),
            soft_threshold_ms: default_soft_threshold_ms(),
            hard_threshold_ms: default_hard_threshold_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl ConnectionConfig {
    pub fn to_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            endpoint: self.endpoint.clone(),
            max_attempts: self.max_attempts,
        }
    }
}

impl WatchdogConfig {
    pub fn to_settings(&self) -> WatchdogSettings {
        WatchdogSettings {
            interval: Duration::from_millis(self.interval_ms),
            soft_threshold: Duration::from_millis(self.soft_threshold_ms),
            hard_threshold: Duration::from_millis(self.hard_threshold_ms),
        }
    }
}

impl StatusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Load `config/plant.*`, overridable with `PLANT_<SECTION>__<KEY>` variables
pub fn load_plant_config() -> anyhow::Result<PlantConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/plant"))
        .add_source(
            config::Environment::with_prefix("PLANT")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: PlantConfig = settings.try_deserialize()?;
    validate_plant_config(&config)?;
    Ok(config)
}

pub fn load_data_points() -> anyhow::Result<Vec<DataPointDescriptor>> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/data_points"))
        .build()?;

    let config: DataPointsConfig = settings.try_deserialize()?;
    Ok(config.points)
}

fn validate_plant_config(config: &PlantConfig) -> anyhow::Result<()> {
    if config.connection.endpoint.trim().is_empty() {
        anyhow::bail!("connection.endpoint must not be empty");
    }
    if config.watchdog.soft_threshold_ms >= config.watchdog.hard_threshold_ms {
        anyhow::bail!(
            "watchdog.soft_threshold_ms ({}) must be below watchdog.hard_threshold_ms ({})",
            config.watchdog.soft_threshold_ms,
            config.watchdog.hard_threshold_ms
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::data_point::UiKind;
    use config::{Config, File, FileFormat};

    fn parse<T: serde::de::DeserializeOwned>(toml: &str) -> T {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_plant_config_defaults() {
        let config: PlantConfig = parse(
            r#"
            [connection]
            endpoint = "ws://plant.local:8000/ws"
            "#,
        );

        assert_eq!(config.connection.max_attempts, 10);
        assert!(config.status.is_none());
        assert_eq!(config.server.bind, "0.0.0.0:8080");

        let watchdog = config.watchdog.to_settings();
        assert_eq!(watchdog.interval, Duration::from_secs(2));
        assert_eq!(watchdog.soft_threshold, Duration::from_secs(30));
        assert_eq!(watchdog.hard_threshold, Duration::from_secs(40));
        assert!(validate_plant_config(&config).is_ok());
    }

    #[test]
    fn test_plant_config_rejects_inverted_thresholds() {
        let config: PlantConfig = parse(
            r#"
            [connection]
            endpoint = "ws://plant.local:8000/ws"

            [watchdog]
            soft_threshold_ms = 45000
            "#,
        );

        assert!(validate_plant_config(&config).is_err());
    }

    #[test]
    fn test_data_points_config() {
        let config: DataPointsConfig = parse(
            r#"
            [[points]]
            id = "grid_v_a"
            name = "Grid Voltage Phase A"
            address = "30001"
            category = "grid"
            ui_type = "display"
            unit = "V"
            three_phase_group = "grid_voltage"
            phase = "a"
            is_single_phase = false

            [[points]]
            id = "battery_soc"
            name = "Battery SOC"
            ui_type = "gauge"
            unit = "%"
            min = 0
            max = 100
            "#,
        );

        assert_eq!(config.points.len(), 2);
        assert_eq!(config.points[0].group_key(), Some("grid_voltage"));
        assert_eq!(config.points[1].ui_type, UiKind::Gauge);
        assert_eq!(config.points[1].max, Some(100.0));
    }
}
