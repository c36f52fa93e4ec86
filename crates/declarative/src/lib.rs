//! # Declarative
//!
//! Reconciliation of a single filesystem entry: compare what a path should
//! be (target state) with what it is (destination state), and make the
//! minimal change that brings the destination in line.
//!
//! ## Core Concepts
//!
//! - **TargetStateEntry**: the desired state of a path - absent, a
//!   directory, a file, a symlink, or a script to run
//! - **DestStateEntry**: the observed state of the same path
//! - **System**: every side effect (writes, removals, scripts, the persistent
//!   state store) goes through this trait
//! - **ReconcilePlan** / [`execute`]: apply many pairs in order, with
//!   progress reporting and confirmation
//!
//! Contents and link targets are loaded lazily ([`LazyContents`],
//! [`LazyLinkname`]) and compared by SHA-256, so an entry that already
//! matches is never rendered twice or rewritten.
//!
//! ## Example
//!
//! ```
//! use declarative::{
//!     ApplyResult, DestStateEntry, LazyContents, MemorySystem, System, TargetStateEntry,
//! };
//! use std::path::Path;
//!
//! let system = MemorySystem::new();
//! system.add_file("/home/user/.netrc", 0o644, "machine example.com");
//!
//! let target = TargetStateEntry::file(LazyContents::from_bytes("machine example.com"), 0o600);
//! let dest = system.read_dest_state(Path::new("/home/user/.netrc"))?;
//!
//! assert!(!target.equal(&dest)?);
//! assert_eq!(target.apply(&system, &dest)?, ApplyResult::PermissionsChanged);
//! # Ok::<(), declarative::Error>(())
//! ```
//!
//! ## Scripts
//!
//! Scripts are never "equal" or "different": [`TargetStateEntry::equal`]
//! always returns `true` for them. A script marked `once` runs at most once
//! per distinct (name, contents) pair; successful runs are recorded in the
//! [`SCRIPT_ONCE_STATE_BUCKET`] bucket of the state store.

pub mod context;
pub mod dest;
pub mod diff;
pub mod error;
pub mod executor;
pub mod lazy;
pub mod memory;
pub mod once;
pub mod planner;
pub mod system;
pub mod target;
pub mod types;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, ConfirmCallback, LogProgress, NoProgress, ProgressCallback,
};
pub use dest::DestStateEntry;
pub use diff::{DiffSummary, EntryDiff, compute_diffs, group_by_kind};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{execute, execute_simple};
pub use lazy::{LazyContents, LazyLinkname, Sha256Sum, sha256};
pub use memory::{Call, MemorySystem, Op};
pub use once::{SCRIPT_ONCE_STATE_BUCKET, ScriptOnceState, script_once_key};
pub use planner::{ReconcilePlan, Reconciliation};
pub use system::{DryRunSystem, LoggingSystem, System};
pub use target::{
    TargetStateDir, TargetStateEntry, TargetStateFile, TargetStateScript, TargetStateSymlink,
};
pub use types::{ApplyResult, ApplySummary, EntryKind, ExecuteOptions, Permissions};
