//! Core types shared by target and destination entries

use serde::{Deserialize, Serialize};
use std::fmt;

/// File mode bits (`0o644`, `0o755`, ...).
pub type Permissions = u32;

/// The kind of an entry, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Absent,
    Dir,
    File,
    Symlink,
    Script,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Dir => "directory",
            Self::File => "file",
            Self::Symlink => "symlink",
            Self::Script => "script",
        };
        f.write_str(name)
    }
}

/// What applying a single entry did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Destination already matched
    NoChange,
    /// Nothing existed and the entry was created
    Created,
    /// Contents were rewritten or an entry of another kind was replaced
    Modified,
    /// Only the mode bits were changed
    PermissionsChanged,
    /// The destination was removed
    Removed,
    /// A script was executed
    Ran,
    /// Nothing was done on purpose
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents a change to the destination
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Modified | Self::PermissionsChanged | Self::Removed | Self::Ran
        )
    }
}

/// Summary of a batch of applies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub scripts_run: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ApplySummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed + self.scripts_run
    }

    /// Check if every entry applied cleanly
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of entries processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.failed + self.no_change
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ApplySummary) {
        self.created += other.created;
        self.modified += other.modified;
        self.removed += other.removed;
        self.scripts_run += other.scripts_run;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.no_change += other.no_change;
    }

    /// Count one result
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified | ApplyResult::PermissionsChanged => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Ran => self.scripts_run += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for batch execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just report what would happen
    pub dry_run: bool,
    /// Carry on with later entries after one fails
    pub keep_going: bool,
}
