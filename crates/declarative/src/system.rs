//! The `System` capability trait and its wrappers
//!
//! Entries never touch the filesystem themselves. Every observation and side
//! effect goes through a [`System`], so the same reconciliation logic can run
//! against the real filesystem, an in-memory one, or a dry run.

use crate::dest::DestStateEntry;
use crate::error::Result;
use crate::types::Permissions;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Side effects and state storage used while applying entries.
pub trait System {
    /// Observe what currently exists at `path`, without following a final symlink.
    fn read_dest_state(&self, path: &Path) -> Result<DestStateEntry>;

    /// Write `contents` to `path` and set its mode to `perm`.
    fn write_file(&self, path: &Path, contents: &[u8], perm: Permissions) -> Result<()>;

    /// Set the mode of `path`.
    fn chmod(&self, path: &Path, perm: Permissions) -> Result<()>;

    /// Create the directory `path` (not its parents).
    fn mkdir(&self, path: &Path, perm: Permissions) -> Result<()>;

    /// Remove `path` and everything below it. A missing path is not an error.
    fn remove_all(&self, path: &Path) -> Result<()>;

    /// Create a symlink at `path` pointing to `linkname`.
    fn write_symlink(&self, linkname: &str, path: &Path) -> Result<()>;

    /// Execute the script `name` with the given contents.
    fn run_script(&self, name: &str, contents: &[u8]) -> Result<()>;

    /// Look up `key` in `bucket` of the persistent state store.
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key` in `bucket` of the persistent state store.
    fn set(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()>;
}

impl<T: System + ?Sized> System for &T {
    fn read_dest_state(&self, path: &Path) -> Result<DestStateEntry> {
        (**self).read_dest_state(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8], perm: Permissions) -> Result<()> {
        (**self).write_file(path, contents, perm)
    }

    fn chmod(&self, path: &Path, perm: Permissions) -> Result<()> {
        (**self).chmod(path, perm)
    }

    fn mkdir(&self, path: &Path, perm: Permissions) -> Result<()> {
        (**self).mkdir(path, perm)
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        (**self).remove_all(path)
    }

    fn write_symlink(&self, linkname: &str, path: &Path) -> Result<()> {
        (**self).write_symlink(linkname, path)
    }

    fn run_script(&self, name: &str, contents: &[u8]) -> Result<()> {
        (**self).run_script(name, contents)
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(bucket, key)
    }

    fn set(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(bucket, key, value)
    }
}

/// A system that reads through to another system but never changes anything.
///
/// Every mutation (including running scripts and writing state) is dropped
/// and only noted, so [`DryRunSystem::modified`] tells whether a real apply
/// would have done something.
#[derive(Debug)]
pub struct DryRunSystem<S> {
    inner: S,
    modified: AtomicBool,
}

impl<S: System> DryRunSystem<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            modified: AtomicBool::new(false),
        }
    }

    /// Whether any mutation was requested.
    pub fn modified(&self) -> bool {
        self.modified.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn would(&self, what: std::fmt::Arguments<'_>) -> Result<()> {
        log::info!("would {what}");
        self.modified.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl<S: System> System for DryRunSystem<S> {
    fn read_dest_state(&self, path: &Path) -> Result<DestStateEntry> {
        self.inner.read_dest_state(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8], perm: Permissions) -> Result<()> {
        self.would(format_args!(
            "write {} ({} bytes, mode {perm:o})",
            path.display(),
            contents.len()
        ))
    }

    fn chmod(&self, path: &Path, perm: Permissions) -> Result<()> {
        self.would(format_args!("chmod {perm:o} {}", path.display()))
    }

    fn mkdir(&self, path: &Path, perm: Permissions) -> Result<()> {
        self.would(format_args!("mkdir {} (mode {perm:o})", path.display()))
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        self.would(format_args!("remove {}", path.display()))
    }

    fn write_symlink(&self, linkname: &str, path: &Path) -> Result<()> {
        self.would(format_args!("link {} -> {linkname}", path.display()))
    }

    fn run_script(&self, name: &str, _contents: &[u8]) -> Result<()> {
        self.would(format_args!("run script {name}"))
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn set(&self, bucket: &str, key: &str, _value: &[u8]) -> Result<()> {
        self.would(format_args!("record {bucket}/{key}"))
    }
}

/// A system that logs every call at debug level before delegating.
#[derive(Debug)]
pub struct LoggingSystem<S> {
    inner: S,
}

impl<S: System> LoggingSystem<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

fn logged<T>(call: std::fmt::Arguments<'_>, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => log::debug!("{call}"),
        Err(err) => log::debug!("{call}: {err}"),
    }
    result
}

impl<S: System> System for LoggingSystem<S> {
    fn read_dest_state(&self, path: &Path) -> Result<DestStateEntry> {
        let result = self.inner.read_dest_state(path);
        match &result {
            Ok(entry) => log::debug!("read_dest_state {}: {}", path.display(), entry.kind()),
            Err(err) => log::debug!("read_dest_state {}: {err}", path.display()),
        }
        result
    }

    fn write_file(&self, path: &Path, contents: &[u8], perm: Permissions) -> Result<()> {
        logged(
            format_args!(
                "write_file {} ({} bytes, mode {perm:o})",
                path.display(),
                contents.len()
            ),
            self.inner.write_file(path, contents, perm),
        )
    }

    fn chmod(&self, path: &Path, perm: Permissions) -> Result<()> {
        logged(
            format_args!("chmod {} {perm:o}", path.display()),
            self.inner.chmod(path, perm),
        )
    }

    fn mkdir(&self, path: &Path, perm: Permissions) -> Result<()> {
        logged(
            format_args!("mkdir {} {perm:o}", path.display()),
            self.inner.mkdir(path, perm),
        )
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        logged(
            format_args!("remove_all {}", path.display()),
            self.inner.remove_all(path),
        )
    }

    fn write_symlink(&self, linkname: &str, path: &Path) -> Result<()> {
        logged(
            format_args!("write_symlink {} -> {linkname}", path.display()),
            self.inner.write_symlink(linkname, path),
        )
    }

    fn run_script(&self, name: &str, contents: &[u8]) -> Result<()> {
        logged(
            format_args!("run_script {name} ({} bytes)", contents.len()),
            self.inner.run_script(name, contents),
        )
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self.inner.get(bucket, key);
        let found = matches!(result, Ok(Some(_)));
        logged(format_args!("get {bucket}/{key} (found: {found})"), result)
    }

    fn set(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        logged(
            format_args!("set {bucket}/{key} ({} bytes)", value.len()),
            self.inner.set(bucket, key, value),
        )
    }
}
