// Three-phase grouping domain models
use super::data_point::{DataPointDescriptor, Phase, UiKind};
use serde::Serialize;

/// Members of a group, one slot per electrical phase
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseMembers {
    pub a: Option<DataPointDescriptor>,
    pub b: Option<DataPointDescriptor>,
    pub c: Option<DataPointDescriptor>,
}

impl PhaseMembers {
    pub fn get(&self, phase: Phase) -> Option<&DataPointDescriptor> {
        match phase {
            Phase::A => self.a.as_ref(),
            Phase::B => self.b.as_ref(),
            Phase::C => self.c.as_ref(),
            Phase::X => None,
        }
    }

    pub fn slot_mut(&mut self, phase: Phase) -> Option<&mut Option<DataPointDescriptor>> {
        match phase {
            Phase::A => Some(&mut self.a),
            Phase::B => Some(&mut self.b),
            Phase::C => Some(&mut self.c),
            Phase::X => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataPointDescriptor> {
        [&self.a, &self.b, &self.c].into_iter().flatten()
    }
}

/// Cluster of per-phase readings shown as one card
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreePhaseGroup {
    /// Bucket key, `<group>-<uiKind>`
    pub key: String,
    pub group_name: String,
    pub title: String,
    pub ui_kind: UiKind,
    pub unit: String,
    pub icon: Option<String>,
    pub category: String,
    pub phases: PhaseMembers,
}

impl ThreePhaseGroup {
    pub fn members(&self) -> impl Iterator<Item = &DataPointDescriptor> {
        self.phases.iter()
    }

    pub fn phase_count(&self) -> usize {
        self.phases.iter().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectionReason {
    BucketSize(usize),
    DuplicatePhase(Phase),
    MixedUiKinds,
    TooFewPhases(usize),
}

/// Why a candidate bucket was shown as individual points
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingDiagnostic {
    pub key: String,
    pub reason: RejectionReason,
    pub point_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupingResult {
    pub groups: Vec<ThreePhaseGroup>,
    pub individuals: Vec<DataPointDescriptor>,
    pub diagnostics: Vec<GroupingDiagnostic>,
}
