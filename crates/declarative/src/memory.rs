//! In-memory `System` for tests
//!
//! [`MemorySystem`] keeps a small filesystem and state store in memory and
//! records every call it receives, so apply logic can be checked call by call
//! without touching disk. Scripts are recorded, never executed.

use crate::dest::DestStateEntry;
use crate::error::{Error, Result};
use crate::lazy::{LazyContents, LazyLinkname};
use crate::system::System;
use crate::types::Permissions;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A recorded call on a [`MemorySystem`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    WriteFile {
        path: PathBuf,
        contents: Vec<u8>,
        perm: Permissions,
    },
    Chmod {
        path: PathBuf,
        perm: Permissions,
    },
    Mkdir {
        path: PathBuf,
        perm: Permissions,
    },
    RemoveAll(PathBuf),
    WriteSymlink {
        linkname: String,
        path: PathBuf,
    },
    RunScript {
        name: String,
        contents: Vec<u8>,
    },
    Get {
        bucket: String,
        key: String,
    },
    Set {
        bucket: String,
        key: String,
        value: Vec<u8>,
    },
}

impl Call {
    /// Whether this call changes the filesystem or the state store.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Get { .. })
    }
}

/// Operations that can be made to fail with [`MemorySystem::fail_on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    WriteFile,
    Chmod,
    Mkdir,
    RemoveAll,
    WriteSymlink,
    RunScript,
    Get,
    Set,
}

#[derive(Debug, Clone)]
enum Node {
    Dir { perm: Permissions },
    File { perm: Permissions, contents: Vec<u8> },
    Symlink { linkname: String },
}

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<PathBuf, Node>,
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    calls: Vec<Call>,
    failing: HashSet<Op>,
}

impl Inner {
    fn injected(&self, op: Op, path: &Path) -> Result<()> {
        if self.failing.contains(&op) {
            return Err(Error::io(
                op.verb(),
                path,
                io::Error::other("injected failure"),
            ));
        }
        Ok(())
    }
}

impl Op {
    fn verb(self) -> &'static str {
        match self {
            Self::WriteFile => "write",
            Self::Chmod => "chmod",
            Self::Mkdir => "mkdir",
            Self::RemoveAll => "remove",
            Self::WriteSymlink => "symlink",
            Self::RunScript => "run",
            Self::Get => "get",
            Self::Set => "set",
        }
    }
}

/// An in-memory filesystem and state store that records its calls
#[derive(Debug, Default)]
pub struct MemorySystem {
    inner: Mutex<Inner>,
}

impl MemorySystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    pub fn add_dir(&self, path: impl Into<PathBuf>, perm: Permissions) {
        self.lock().nodes.insert(path.into(), Node::Dir { perm });
    }

    pub fn add_file(
        &self,
        path: impl Into<PathBuf>,
        perm: Permissions,
        contents: impl Into<Vec<u8>>,
    ) {
        self.lock().nodes.insert(
            path.into(),
            Node::File {
                perm,
                contents: contents.into(),
            },
        );
    }

    pub fn add_symlink(&self, path: impl Into<PathBuf>, linkname: impl Into<String>) {
        self.lock().nodes.insert(
            path.into(),
            Node::Symlink {
                linkname: linkname.into(),
            },
        );
    }

    /// Store a value without recording a call.
    pub fn set_value(&self, bucket: &str, key: &str, value: &[u8]) {
        self.lock()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
    }

    /// Make every later call of `op` fail.
    pub fn fail_on(&self, op: Op) {
        self.lock().failing.insert(op);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Recorded calls that changed something.
    pub fn mutations(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.lock().nodes.contains_key(path.as_ref())
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().nodes.get(path.as_ref()) {
            Some(Node::File { contents, .. }) => Some(contents.clone()),
            _ => None,
        }
    }

    pub fn permissions(&self, path: impl AsRef<Path>) -> Option<Permissions> {
        match self.lock().nodes.get(path.as_ref()) {
            Some(Node::Dir { perm } | Node::File { perm, .. }) => Some(*perm),
            _ => None,
        }
    }

    pub fn linkname(&self, path: impl AsRef<Path>) -> Option<String> {
        match self.lock().nodes.get(path.as_ref()) {
            Some(Node::Symlink { linkname }) => Some(linkname.clone()),
            _ => None,
        }
    }

    pub fn value(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|values| values.get(key))
            .cloned()
    }

    /// Names of scripts run so far, in order.
    pub fn scripts_run(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::RunScript { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

impl System for MemorySystem {
    fn read_dest_state(&self, path: &Path) -> Result<DestStateEntry> {
        let entry = match self.lock().nodes.get(path) {
            None => DestStateEntry::absent(path),
            Some(Node::Dir { perm }) => DestStateEntry::dir(path, *perm),
            Some(Node::File { perm, contents }) => {
                DestStateEntry::file(path, *perm, LazyContents::from_bytes(contents.clone()))
            }
            Some(Node::Symlink { linkname }) => {
                DestStateEntry::symlink(path, LazyLinkname::from_string(linkname.clone()))
            }
        };
        Ok(entry)
    }

    fn write_file(&self, path: &Path, contents: &[u8], perm: Permissions) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::WriteFile {
            path: path.to_path_buf(),
            contents: contents.to_vec(),
            perm,
        });
        inner.injected(Op::WriteFile, path)?;
        if let Some(Node::Dir { .. }) = inner.nodes.get(path) {
            return Err(Error::io(
                "write",
                path,
                io::Error::new(io::ErrorKind::IsADirectory, "is a directory"),
            ));
        }
        inner.nodes.insert(
            path.to_path_buf(),
            Node::File {
                perm,
                contents: contents.to_vec(),
            },
        );
        Ok(())
    }

    fn chmod(&self, path: &Path, perm: Permissions) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Chmod {
            path: path.to_path_buf(),
            perm,
        });
        inner.injected(Op::Chmod, path)?;
        match inner.nodes.get_mut(path) {
            Some(Node::Dir { perm: current } | Node::File { perm: current, .. }) => {
                *current = perm;
                Ok(())
            }
            Some(Node::Symlink { .. }) => Err(Error::io(
                "chmod",
                path,
                io::Error::new(io::ErrorKind::Unsupported, "cannot chmod a symlink"),
            )),
            None => Err(Error::io("chmod", path, io::ErrorKind::NotFound.into())),
        }
    }

    fn mkdir(&self, path: &Path, perm: Permissions) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Mkdir {
            path: path.to_path_buf(),
            perm,
        });
        inner.injected(Op::Mkdir, path)?;
        if inner.nodes.contains_key(path) {
            return Err(Error::io("mkdir", path, io::ErrorKind::AlreadyExists.into()));
        }
        inner.nodes.insert(path.to_path_buf(), Node::Dir { perm });
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::RemoveAll(path.to_path_buf()));
        inner.injected(Op::RemoveAll, path)?;
        inner.nodes.retain(|node, _| !node.starts_with(path));
        Ok(())
    }

    fn write_symlink(&self, linkname: &str, path: &Path) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::WriteSymlink {
            linkname: linkname.to_string(),
            path: path.to_path_buf(),
        });
        inner.injected(Op::WriteSymlink, path)?;
        if inner.nodes.contains_key(path) {
            return Err(Error::io(
                "symlink",
                path,
                io::ErrorKind::AlreadyExists.into(),
            ));
        }
        inner.nodes.insert(
            path.to_path_buf(),
            Node::Symlink {
                linkname: linkname.to_string(),
            },
        );
        Ok(())
    }

    fn run_script(&self, name: &str, contents: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::RunScript {
            name: name.to_string(),
            contents: contents.to_vec(),
        });
        if inner.failing.contains(&Op::RunScript) {
            return Err(Error::Script {
                name: name.to_string(),
                reason: "exit status 1".to_string(),
            });
        }
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let mut inner = self.lock();
        inner.calls.push(Call::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        if inner.failing.contains(&Op::Get) {
            return Err(Error::State(format!("cannot read {bucket}/{key}")));
        }
        Ok(inner
            .buckets
            .get(bucket)
            .and_then(|values| values.get(key))
            .cloned())
    }

    fn set(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Set {
            bucket: bucket.to_string(),
            key: key.to_string(),
            value: value.to_vec(),
        });
        if inner.failing.contains(&Op::Set) {
            return Err(Error::State(format!("cannot write {bucket}/{key}")));
        }
        inner
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
