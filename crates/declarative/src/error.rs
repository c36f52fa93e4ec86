//! Error types for reconciliation.
//!
//! Errors are grouped into categories matching where they come from: loading
//! lazy contents, mutating the filesystem, running scripts, and recording
//! once-scripts in the state store.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Broad origin of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Contents or a link target could not be produced
    Contents,
    /// A filesystem read or mutation failed
    Filesystem,
    /// A script exited unsuccessfully or could not be started
    Script,
    /// A script ran but its once-record could not be saved
    Ledger,
    /// The persistent bucket store is unreadable or unwritable
    State,
}

impl ErrorCategory {
    /// Short human readable label.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Contents => "contents unavailable",
            Self::Filesystem => "filesystem error",
            Self::Script => "script failed",
            Self::Ledger => "script state not recorded",
            Self::State => "state store error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors that can occur while comparing or applying entries
#[derive(Error, Debug)]
pub enum Error {
    /// A lazy content or linkname source failed. The failure is cached, so
    /// every later request reports the same underlying error.
    #[error("failed to load contents: {0:#}")]
    Contents(Arc<anyhow::Error>),

    /// A filesystem operation failed
    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A script could not be run or exited unsuccessfully
    #[error("script {name} failed: {reason}")]
    Script { name: String, reason: String },

    /// A once-script ran but recording it failed
    #[error("script {name} ran but could not be recorded: {source}")]
    Ledger {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// The bucket store failed
    #[error("state store: {0}")]
    State(String),

    /// A ledger record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Build an [`Error::Io`] for `op` on `path`.
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Categorize this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Contents(_) => ErrorCategory::Contents,
            Self::Io { .. } => ErrorCategory::Filesystem,
            Self::Script { .. } => ErrorCategory::Script,
            Self::Ledger { .. } => ErrorCategory::Ledger,
            Self::State(_) | Self::Serialize(_) => ErrorCategory::State,
        }
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;
