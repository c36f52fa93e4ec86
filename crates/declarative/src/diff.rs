//! Diff computation for reconciliation plans

use crate::dest::DestStateEntry;
use crate::error::Result;
use crate::planner::ReconcilePlan;
use crate::target::TargetStateEntry;
use crate::types::EntryKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A path whose destination does not match its target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDiff {
    pub path: PathBuf,
    /// What the path should be
    pub target: EntryKind,
    /// What the path currently is
    pub current: EntryKind,
}

impl EntryDiff {
    /// Compare one pair, returning `None` if the destination already matches
    pub fn between(target: &TargetStateEntry, dest: &DestStateEntry) -> Result<Option<Self>> {
        if target.equal(dest)? {
            return Ok(None);
        }
        Ok(Some(Self {
            path: dest.path().to_path_buf(),
            target: target.kind(),
            current: dest.kind(),
        }))
    }

    /// Check if this diff creates something where nothing is
    pub fn is_addition(&self) -> bool {
        self.current == EntryKind::Absent && self.target != EntryKind::Absent
    }

    /// Check if this diff removes what is there
    pub fn is_removal(&self) -> bool {
        self.target == EntryKind::Absent
    }

    /// Check if this diff changes an existing entry
    pub fn is_modification(&self) -> bool {
        !self.is_addition() && !self.is_removal()
    }
}

/// Compute diffs for every pair in a plan
///
/// Returns only entries whose destination differs. Errors loading contents
/// are returned, not skipped.
pub fn compute_diffs(plan: &ReconcilePlan) -> Result<Vec<EntryDiff>> {
    let mut diffs = Vec::new();
    for entry in plan {
        if let Some(diff) = EntryDiff::between(&entry.target, &entry.dest)? {
            diffs.push(diff);
        }
    }
    Ok(diffs)
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    pub additions: usize,
    pub removals: usize,
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[EntryDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by target kind
pub fn group_by_kind(diffs: &[EntryDiff]) -> HashMap<EntryKind, Vec<&EntryDiff>> {
    let mut groups: HashMap<EntryKind, Vec<&EntryDiff>> = HashMap::new();
    for diff in diffs {
        groups.entry(diff.target).or_default().push(diff);
    }
    groups
}
