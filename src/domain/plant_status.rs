// Plant status domain model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlantStatus {
    Online,
    Offline,
    Disconnected,
}

impl PlantStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "online" => Some(PlantStatus::Online),
            "offline" => Some(PlantStatus::Offline),
            "disconnected" => Some(PlantStatus::Disconnected),
            _ => None,
        }
    }
}

/// Latest poll result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantStatusReport {
    pub status: PlantStatus,
    pub checked_at: Option<DateTime<Utc>>,
}

impl PlantStatusReport {
    pub fn unknown() -> Self {
        Self {
            status: PlantStatus::Disconnected,
            checked_at: None,
        }
    }

    pub fn new(status: PlantStatus, checked_at: DateTime<Utc>) -> Self {
        Self {
            status,
            checked_at: Some(checked_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(PlantStatus::parse("Online"), Some(PlantStatus::Online));
        assert_eq!(PlantStatus::parse(" offline "), Some(PlantStatus::Offline));
        assert_eq!(PlantStatus::parse("maintenance"), None);
    }
}
