//! Progress and confirmation callbacks
//!
//! These traits keep the executor free of any particular terminal UI.

use crate::error::Error;
use crate::types::{ApplyResult, EntryKind};
use anyhow::Result;
use std::path::Path;

/// Progress callback for batch execution
pub trait ProgressCallback {
    /// Called before the first entry of a batch
    fn on_batch_start(&mut self, count: usize);

    /// Called when starting to apply a single entry
    fn on_entry_start(&mut self, path: &Path, kind: EntryKind);

    /// Called when an entry applied successfully
    fn on_entry_complete(&mut self, path: &Path, result: &ApplyResult);

    /// Called when an entry failed to apply
    fn on_entry_failed(&mut self, path: &Path, error: &Error);

    /// Called after the last entry of a batch
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    ///
    /// Returns `true` if the user confirmed.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_entry_start(&mut self, _path: &Path, _kind: EntryKind) {}
    fn on_entry_complete(&mut self, _path: &Path, _result: &ApplyResult) {}
    fn on_entry_failed(&mut self, _path: &Path, _error: &Error) {}
    fn on_batch_complete(&mut self) {}
}

/// Progress callback that reports changes through the `log` facade
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_batch_start(&mut self, count: usize) {
        log::debug!("applying {count} entries");
    }

    fn on_entry_start(&mut self, path: &Path, kind: EntryKind) {
        log::trace!("{} ({kind})", path.display());
    }

    fn on_entry_complete(&mut self, path: &Path, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => log::trace!("{}: up to date", path.display()),
            ApplyResult::Skipped { reason } => log::debug!("{}: {reason}", path.display()),
            _ => log::info!("{}: {result:?}", path.display()),
        }
    }

    fn on_entry_failed(&mut self, path: &Path, error: &Error) {
        log::error!("{}: {error}", path.display());
    }

    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
