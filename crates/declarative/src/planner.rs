//! Reconciliation plans - ordered (target, destination) pairs

use crate::dest::DestStateEntry;
use crate::error::Result;
use crate::target::TargetStateEntry;
use crate::types::EntryKind;
use std::path::Path;

/// One path to reconcile: what it should be and what it is
#[derive(Debug)]
pub struct Reconciliation {
    pub target: TargetStateEntry,
    pub dest: DestStateEntry,
}

impl Reconciliation {
    pub fn new(target: TargetStateEntry, dest: DestStateEntry) -> Self {
        Self { target, dest }
    }

    pub fn path(&self) -> &Path {
        self.dest.path()
    }
}

/// An ordered list of reconciliations
///
/// Order is significant: entries are applied exactly as pushed, so parents
/// must come before their children.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    entries: Vec<Reconciliation>,
}

impl ReconcilePlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair to the plan
    pub fn push(&mut self, target: TargetStateEntry, dest: DestStateEntry) {
        self.entries.push(Reconciliation::new(target, dest));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reconciliation> {
        self.entries.iter()
    }

    /// Number of script entries
    pub fn script_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.target.kind() == EntryKind::Script)
            .count()
    }

    /// Filter plan to only include entries matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Reconciliation) -> bool,
    {
        Self {
            entries: self.entries.into_iter().filter(|e| predicate(e)).collect(),
        }
    }

    /// Keep only entries at or below `prefix`; `None` keeps everything
    pub fn filter_by_prefix(self, prefix: Option<&Path>) -> Self {
        match prefix {
            None => self,
            Some(prefix) => self.filter(|entry| entry.path().starts_with(prefix)),
        }
    }

    /// Evaluate every target, stopping at the first error
    pub fn evaluate(&self) -> Result<()> {
        self.entries
            .iter()
            .try_for_each(|entry| entry.target.evaluate())
    }
}

impl<'a> IntoIterator for &'a ReconcilePlan {
    type Item = &'a Reconciliation;
    type IntoIter = std::slice::Iter<'a, Reconciliation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<Reconciliation> for ReconcilePlan {
    fn from_iter<I: IntoIterator<Item = Reconciliation>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
