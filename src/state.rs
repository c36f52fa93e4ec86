//! Persistent bucket store backing the once-script ledger.
//!
//! The store is a TOML file of tables, one table per bucket:
//!
//! ```toml
//! [scriptOnce]
//! "setup.sh:9f86d0..." = '{"name":"setup.sh","executedAt":"2025-01-01T00:00:00Z"}'
//! ```
//!
//! Several stores (or several processes) may share one file. Every read
//! takes a shared lock on `<file>.lock` and every write an exclusive one,
//! re-reading the file before changing it, so concurrent writers merge
//! instead of overwriting each other. A [`StateSession`] holds the exclusive
//! lock across several operations, which is what makes a once-script's
//! "not recorded yet, run, record" sequence atomic between runs.

use anyhow::{Context, Result};
use declarative::{SCRIPT_ONCE_STATE_BUCKET, ScriptOnceState};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

type Buckets = BTreeMap<String, BTreeMap<String, String>>;

/// File-backed bucket → key → value map.
///
/// Every `set` and `delete` is written to disk before returning.
#[derive(Debug)]
pub struct PersistentState {
    path: PathBuf,
    lock_path: PathBuf,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Contents as last read from or written to disk
    buckets: Buckets,
    /// Exclusive lock held by an open [`StateSession`]
    session: Option<File>,
}

/// Exclusive hold on a [`PersistentState`] file, released on drop.
///
/// While it is alive other stores and processes block on every operation,
/// and this store skips re-reading the file.
#[derive(Debug)]
pub struct StateSession<'a> {
    state: &'a PersistentState,
}

impl Drop for StateSession<'_> {
    fn drop(&mut self) {
        let mut inner = self
            .state
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = inner.session.take()
            && let Err(e) = FileExt::unlock(&file)
        {
            log::warn!("Failed to unlock {}: {e}", self.state.lock_path.display());
        }
    }
}

impl PersistentState {
    /// Load the store at `path`, or start empty if the file doesn't exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let buckets = load(&path)?;

        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");

        Ok(Self {
            lock_path: PathBuf::from(lock_path),
            path,
            inner: Mutex::new(Inner {
                buckets,
                session: None,
            }),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the lock file beside it
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Hold the exclusive file lock until the returned session is dropped
    pub fn lock_session(&self) -> Result<StateSession<'_>> {
        let mut inner = self.lock()?;
        if inner.session.is_some() {
            anyhow::bail!("state session already open for {}", self.path.display());
        }
        let file = self.lock_file(true)?;
        inner.buckets = load(&self.path)?;
        inner.session = Some(file);
        log::debug!("Locked {}", self.lock_path.display());
        Ok(StateSession { state: self })
    }

    pub fn get(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        self.with_lock(false, |buckets| {
            Ok(buckets.get(bucket).and_then(|b| b.get(key)).cloned())
        })
    }

    /// Store a value and save immediately.
    ///
    /// The in-memory map is left unchanged if saving fails.
    pub fn set(&self, bucket: &str, key: &str, value: &str) -> Result<()> {
        self.with_lock(true, |buckets| {
            let mut updated = buckets.clone();
            updated
                .entry(bucket.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
            self.save(&updated)?;
            *buckets = updated;
            Ok(())
        })
    }

    /// Remove a key, returning whether it existed
    pub fn delete(&self, bucket: &str, key: &str) -> Result<bool> {
        self.with_lock(true, |buckets| {
            let mut updated = buckets.clone();
            let existed = match updated.get_mut(bucket) {
                Some(entries) => {
                    let existed = entries.remove(key).is_some();
                    if entries.is_empty() {
                        updated.remove(bucket);
                    }
                    existed
                }
                None => false,
            };
            if existed {
                self.save(&updated)?;
                *buckets = updated;
            }
            Ok(existed)
        })
    }

    /// Keys in a bucket, sorted
    pub fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        self.with_lock(false, |buckets| {
            Ok(buckets
                .get(bucket)
                .map(|b| b.keys().cloned().collect())
                .unwrap_or_default())
        })
    }

    /// Decoded once-script records, keyed by ledger key.
    ///
    /// Entries that fail to decode are skipped with a warning.
    pub fn once_records(&self) -> Result<Vec<(String, ScriptOnceState)>> {
        self.with_lock(false, |buckets| {
            let Some(entries) = buckets.get(SCRIPT_ONCE_STATE_BUCKET) else {
                return Ok(Vec::new());
            };

            let mut records = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                match ScriptOnceState::from_json(value.as_bytes()) {
                    Ok(record) => records.push((key.clone(), record)),
                    Err(e) => log::warn!("Ignoring unreadable ledger entry {key}: {e}"),
                }
            }
            Ok(records)
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("state lock poisoned"))
    }

    /// Run `f` on fresh contents under the file lock.
    ///
    /// Inside a session the lock is already held and memory is current.
    fn with_lock<R>(
        &self,
        exclusive: bool,
        f: impl FnOnce(&mut Buckets) -> Result<R>,
    ) -> Result<R> {
        let mut inner = self.lock()?;
        if inner.session.is_some() {
            return f(&mut inner.buckets);
        }

        let file = self.lock_file(exclusive)?;
        inner.buckets = load(&self.path)?;
        let result = f(&mut inner.buckets);
        FileExt::unlock(&file)
            .with_context(|| format!("Failed to unlock {}", self.lock_path.display()))?;
        result
    }

    fn lock_file(&self, exclusive: bool) -> Result<File> {
        let dir = parent_dir(&self.lock_path);
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .with_context(|| format!("Failed to open {}", self.lock_path.display()))?;

        let locked = if exclusive {
            file.lock_exclusive()
        } else {
            FileExt::lock_shared(&file)
        };
        locked.with_context(|| format!("Failed to lock {}", self.lock_path.display()))?;
        Ok(file)
    }

    fn save(&self, buckets: &Buckets) -> Result<()> {
        let dir = parent_dir(&self.path);
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        let content = toml::to_string_pretty(buckets).context("Failed to serialize state to TOML")?;

        let mut file = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        file.write_all(content.as_bytes())
            .context("Failed to write state")?;
        file.persist(&self.path)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Read the state file, or empty buckets if it doesn't exist yet
fn load(path: &Path) -> Result<Buckets> {
    if !path.exists() {
        log::debug!("State file does not exist, starting empty");
        return Ok(Buckets::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {}", path.display()))?;
    let buckets = toml::from_str(&content)
        .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
    log::debug!("Loaded state from {}", path.display());
    Ok(buckets)
}
