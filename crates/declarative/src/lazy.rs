//! Lazily loaded, cached contents and link targets
//!
//! Target and destination entries describe contents they may never need to
//! read: an entry that already matches is never written, so its contents are
//! never rendered. Each value here is loaded at most once, on first request,
//! and the outcome (success or failure) is kept for the lifetime of the entry.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// A SHA-256 digest of some contents.
pub type Sha256Sum = [u8; 32];

/// Compute the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> Sha256Sum {
    Sha256::digest(data).into()
}

/// Whether `data` has nothing but whitespace in it.
pub fn is_blank(data: &[u8]) -> bool {
    match std::str::from_utf8(data) {
        Ok(text) => text.trim().is_empty(),
        Err(_) => data.trim_ascii().is_empty(),
    }
}

type Source<T> = Box<dyn FnOnce() -> anyhow::Result<T> + Send>;

/// One-shot cell: runs its source on first access and remembers the result.
struct Lazy<T> {
    source: Mutex<Option<Source<T>>>,
    value: OnceLock<std::result::Result<T, Arc<anyhow::Error>>>,
}

impl<T> Lazy<T> {
    fn new(source: impl FnOnce() -> anyhow::Result<T> + Send + 'static) -> Self {
        Self {
            source: Mutex::new(Some(Box::new(source))),
            value: OnceLock::new(),
        }
    }

    fn ready(value: T) -> Self {
        Self {
            source: Mutex::new(None),
            value: OnceLock::from(Ok(value)),
        }
    }

    fn get(&self) -> Result<&T> {
        let loaded = self.value.get_or_init(|| {
            let source = self
                .source
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            match source {
                Some(source) => source().map_err(Arc::new),
                None => Err(Arc::new(anyhow::anyhow!("source already consumed"))),
            }
        });
        loaded.as_ref().map_err(|err| Error::Contents(Arc::clone(err)))
    }

    fn state(&self) -> &'static str {
        match self.value.get() {
            None => "pending",
            Some(Ok(_)) => "loaded",
            Some(Err(_)) => "failed",
        }
    }
}

/// Contents that are read or rendered on demand.
///
/// The SHA-256 digest is cached separately from the contents, and can be
/// supplied up front when it is already known, so comparing two entries by
/// checksum never forces a second read.
pub struct LazyContents {
    contents: Lazy<Vec<u8>>,
    sha256: OnceLock<Sha256Sum>,
}

impl LazyContents {
    /// Contents produced by `source` when first needed.
    pub fn new(source: impl FnOnce() -> anyhow::Result<Vec<u8>> + Send + 'static) -> Self {
        Self {
            contents: Lazy::new(source),
            sha256: OnceLock::new(),
        }
    }

    /// Contents that are already in memory.
    pub fn from_bytes(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: Lazy::ready(contents.into()),
            sha256: OnceLock::new(),
        }
    }

    /// Attach a digest that is already known, e.g. from a previous run.
    pub fn with_sha256(self, sum: Sha256Sum) -> Self {
        let _ = self.sha256.set(sum);
        self
    }

    /// The contents, loading them if needed.
    pub fn contents(&self) -> Result<&[u8]> {
        self.contents.get().map(Vec::as_slice)
    }

    /// The SHA-256 digest of the contents, loading them if needed.
    pub fn contents_sha256(&self) -> Result<Sha256Sum> {
        if let Some(sum) = self.sha256.get() {
            return Ok(*sum);
        }
        let contents = self.contents()?;
        Ok(*self.sha256.get_or_init(|| sha256(contents)))
    }
}

impl fmt::Debug for LazyContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyContents")
            .field("contents", &self.contents.state())
            .field("sha256", &self.sha256.get().map(hex::encode))
            .finish()
    }
}

/// A symlink target that is resolved on demand.
pub struct LazyLinkname {
    linkname: Lazy<String>,
}

impl LazyLinkname {
    /// Link target produced by `source` when first needed.
    pub fn new(source: impl FnOnce() -> anyhow::Result<String> + Send + 'static) -> Self {
        Self {
            linkname: Lazy::new(source),
        }
    }

    /// A link target that is already known.
    pub fn from_string(linkname: impl Into<String>) -> Self {
        Self {
            linkname: Lazy::ready(linkname.into()),
        }
    }

    /// The link target, resolving it if needed.
    pub fn linkname(&self) -> Result<&str> {
        self.linkname.get().map(String::as_str)
    }
}

impl fmt::Debug for LazyLinkname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.linkname.value.get() {
            Some(Ok(linkname)) => f.debug_tuple("LazyLinkname").field(linkname).finish(),
            _ => f
                .debug_tuple("LazyLinkname")
                .field(&self.linkname.state())
                .finish(),
        }
    }
}
