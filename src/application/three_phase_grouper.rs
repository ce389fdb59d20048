// Three-phase grouper - Clusters per-phase data points into display groups
use crate::domain::data_point::DataPointDescriptor;
use crate::domain::three_phase::{
    GroupingDiagnostic, GroupingResult, PhaseMembers, RejectionReason, ThreePhaseGroup,
};
use std::collections::{HashMap, HashSet};

/// Trailing name markers that only identify the phase, lowercase.
/// Longer forms come first so "Phase L1" is not cut down to "Phase".
const PHASE_SUFFIXES: &[&str] = &[
    "(precise)",
    "phase l1",
    "phase l2",
    "phase l3",
    "phase a",
    "phase b",
    "phase c",
    "l1",
    "l2",
    "l3",
];

/// Partition the displayed points into three-phase groups and individual points.
///
/// Misconfigured buckets never fail the whole pass: their members fall back
/// to individual display and the rejection is recorded in `diagnostics`.
pub fn group_points(points: &[DataPointDescriptor]) -> GroupingResult {
    let mut individuals: Vec<DataPointDescriptor> = Vec::new();
    let mut bucket_order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<&DataPointDescriptor>> = HashMap::new();

    for point in points {
        match candidate_key(point) {
            Some(key) => buckets
                .entry(key.clone())
                .or_insert_with(|| {
                    bucket_order.push(key);
                    Vec::new()
                })
                .push(point),
            None => individuals.push(point.clone()),
        }
    }

    let mut groups = Vec::new();
    let mut diagnostics = Vec::new();

    for key in bucket_order {
        let members = buckets.remove(&key).unwrap_or_default();
        match build_group(&key, &members) {
            Ok(group) => groups.push(group),
            Err(reason) => {
                let point_ids: Vec<String> = members.iter().map(|p| p.id.clone()).collect();
                tracing::warn!(
                    "Three-phase group {} rejected ({:?}), showing {:?} individually",
                    key,
                    reason,
                    point_ids
                );
                diagnostics.push(GroupingDiagnostic {
                    key,
                    reason,
                    point_ids,
                });
                individuals.extend(members.into_iter().cloned());
            }
        }
    }

    let mut seen = HashSet::new();
    individuals.retain(|p| seen.insert(p.id.clone()));

    GroupingResult {
        groups,
        individuals,
        diagnostics,
    }
}

/// Bucket key for a grouping candidate, `None` for points shown on their own
fn candidate_key(point: &DataPointDescriptor) -> Option<String> {
    if point.is_single_phase || !point.ui_type.is_groupable() {
        return None;
    }
    let group = point.group_key()?;
    let phase = point.parsed_phase()?;
    if !phase.is_electrical() {
        return None;
    }
    Some(format!("{}-{}", group, point.ui_type.as_str()))
}

fn build_group(
    key: &str,
    members: &[&DataPointDescriptor],
) -> Result<ThreePhaseGroup, RejectionReason> {
    if !(2..=3).contains(&members.len()) {
        return Err(RejectionReason::BucketSize(members.len()));
    }

    let mut phases = PhaseMembers::default();
    for point in members {
        // Candidates always carry an electrical phase
        let Some(phase) = point.parsed_phase() else {
            continue;
        };
        let Some(slot) = phases.slot_mut(phase) else {
            continue;
        };
        if slot.is_some() {
            return Err(RejectionReason::DuplicatePhase(phase));
        }
        *slot = Some((*point).clone());
    }

    let ui_kind = members[0].ui_type;
    if members.iter().any(|p| p.ui_type != ui_kind) {
        return Err(RejectionReason::MixedUiKinds);
    }

    let distinct = phases.iter().count();
    if distinct < 2 {
        return Err(RejectionReason::TooFewPhases(distinct));
    }

    let representative = phases.a.as_ref().unwrap_or(members[0]);
    let group_name = representative.group_key().unwrap_or_default().to_string();
    let title = strip_phase_suffix(&representative.name).unwrap_or_else(|| group_name.clone());

    Ok(ThreePhaseGroup {
        key: key.to_string(),
        title,
        ui_kind,
        unit: representative.unit.clone(),
        icon: representative.icon.clone(),
        category: representative.category.clone(),
        group_name,
        phases,
    })
}

/// Strip trailing phase markers from a point name, `None` if nothing is left
pub fn strip_phase_suffix(name: &str) -> Option<String> {
    let mut title = name.trim_end();

    loop {
        let lower = title.to_ascii_lowercase();
        let cut = PHASE_SUFFIXES.iter().find_map(|suffix| {
            let prefix = lower.strip_suffix(suffix)?;
            let at_boundary = prefix.is_empty() || prefix.ends_with(is_separator);
            at_boundary.then_some(prefix.len())
        });

        match cut {
            Some(len) => title = title[..len].trim_end_matches(is_separator),
            None => break,
        }
    }

    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '-' || c == ':' || c == '_'
}
