// Data point descriptor domain model
use serde::{Deserialize, Serialize};

/// How the dashboard presents a data point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UiKind {
    Display,
    Gauge,
    Button,
    Switch,
}

impl UiKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiKind::Display => "display",
            UiKind::Gauge => "gauge",
            UiKind::Button => "button",
            UiKind::Switch => "switch",
        }
    }

    /// Only read-only kinds can be shown as a three-phase cluster
    pub fn is_groupable(&self) -> bool {
        matches!(self, UiKind::Display | UiKind::Gauge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    A,
    B,
    C,
    X,
}

impl Phase {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Phase::A),
            "b" => Some(Phase::B),
            "c" => Some(Phase::C),
            "x" => Some(Phase::X),
            _ => None,
        }
    }

    pub fn is_electrical(&self) -> bool {
        !matches!(self, Phase::X)
    }
}

/// Static metadata for one data point, supplied by configuration.
/// Keys are camelCase; snake_case spellings are accepted too.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPointDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub category: String,
    #[serde(alias = "ui_type")]
    pub ui_type: UiKind,
    #[serde(default)]
    pub unit: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub factor: Option<f64>,
    pub icon: Option<String>,
    #[serde(alias = "three_phase_group")]
    pub three_phase_group: Option<String>,
    pub phase: Option<String>,
    #[serde(default, alias = "is_single_phase")]
    pub is_single_phase: bool,
}

impl DataPointDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, ui_type: UiKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: String::new(),
            category: String::new(),
            ui_type,
            unit: String::new(),
            min: None,
            max: None,
            factor: None,
            icon: None,
            three_phase_group: None,
            phase: None,
            is_single_phase: false,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn in_group(mut self, group: impl Into<String>, phase: impl Into<String>) -> Self {
        self.three_phase_group = Some(group.into());
        self.phase = Some(phase.into());
        self
    }

    pub fn single_phase(mut self) -> Self {
        self.is_single_phase = true;
        self
    }

    pub fn parsed_phase(&self) -> Option<Phase> {
        self.phase.as_deref().and_then(Phase::parse)
    }

    /// Non-empty group key, if any
    pub fn group_key(&self) -> Option<&str> {
        self.three_phase_group
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }
}
