//! Destination state: what a path currently holds
//!
//! A [`DestStateEntry`] is an observation of a single path, built by whoever
//! scanned the filesystem (see [`System::read_dest_state`]). Contents and link
//! targets are loaded lazily, so observing a file that turns out to match by
//! checksum costs one read at most.

use crate::error::Result;
use crate::lazy::{LazyContents, LazyLinkname, Sha256Sum};
use crate::system::System;
use crate::types::{EntryKind, Permissions};
use std::path::{Path, PathBuf};

/// The observed state of one path
#[derive(Debug)]
pub enum DestStateEntry {
    /// Nothing exists at `path`
    Absent { path: PathBuf },
    /// A directory
    Dir { path: PathBuf, perm: Permissions },
    /// A regular file
    File {
        path: PathBuf,
        perm: Permissions,
        contents: LazyContents,
    },
    /// A symbolic link
    Symlink {
        path: PathBuf,
        linkname: LazyLinkname,
    },
}

impl DestStateEntry {
    pub fn absent(path: impl Into<PathBuf>) -> Self {
        Self::Absent { path: path.into() }
    }

    pub fn dir(path: impl Into<PathBuf>, perm: Permissions) -> Self {
        Self::Dir {
            path: path.into(),
            perm,
        }
    }

    pub fn file(path: impl Into<PathBuf>, perm: Permissions, contents: LazyContents) -> Self {
        Self::File {
            path: path.into(),
            perm,
            contents,
        }
    }

    pub fn symlink(path: impl Into<PathBuf>, linkname: LazyLinkname) -> Self {
        Self::Symlink {
            path: path.into(),
            linkname,
        }
    }

    /// The path this entry describes.
    pub fn path(&self) -> &Path {
        match self {
            Self::Absent { path }
            | Self::Dir { path, .. }
            | Self::File { path, .. }
            | Self::Symlink { path, .. } => path,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Absent { .. } => EntryKind::Absent,
            Self::Dir { .. } => EntryKind::Dir,
            Self::File { .. } => EntryKind::File,
            Self::Symlink { .. } => EntryKind::Symlink,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent { .. })
    }

    /// Mode bits, for directories and files.
    pub fn permissions(&self) -> Option<Permissions> {
        match self {
            Self::Dir { perm, .. } | Self::File { perm, .. } => Some(*perm),
            Self::Absent { .. } | Self::Symlink { .. } => None,
        }
    }

    /// Checksum of a file's contents; `None` for other kinds.
    pub fn contents_sha256(&self) -> Result<Option<Sha256Sum>> {
        match self {
            Self::File { contents, .. } => contents.contents_sha256().map(Some),
            _ => Ok(None),
        }
    }

    /// Link target of a symlink; `None` for other kinds.
    pub fn linkname(&self) -> Result<Option<&str>> {
        match self {
            Self::Symlink { linkname, .. } => linkname.linkname().map(Some),
            _ => Ok(None),
        }
    }

    /// Remove whatever is at this path. Removing an absent entry does nothing.
    pub fn remove(&self, system: &dyn System) -> Result<()> {
        if self.is_absent() {
            return Ok(());
        }
        system.remove_all(self.path())
    }
}
