//! Content-addressable caches
//!
//! A `Cache` mirrors output content into a store keyed by fingerprint and
//! restores it on checkout. One cache per backend kind; like remotes, the
//! stage state machine depends only on the trait.
//!
//! The store is append-mostly: saving identical content under the same
//! fingerprint is idempotent, since the key is derived from the content.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StagehandError, StagehandResult};
use crate::fingerprint::Fingerprint;
use crate::remote::{BackendKind, EntryPath};

/// Content-addressable store contract
///
/// `save` and `checkout` are synchronous from the caller's point of view:
/// they return only once the backend confirms completion.
pub trait Cache: Send + Sync {
    /// The backend kind this cache serves
    fn kind(&self) -> BackendKind;

    /// Fingerprint of the current content at the path, as this cache would
    /// key it, or `None` if the path does not exist
    fn fingerprint_of(&self, path: &EntryPath) -> StagehandResult<Option<Fingerprint>>;

    /// Store the current content at the path, returning its fingerprint
    fn save(&self, path: &EntryPath) -> StagehandResult<Fingerprint>;

    /// Restore content at the path from the store entry for `fingerprint`.
    ///
    /// Fails with [`StagehandError::NotInCache`] when the fingerprint is
    /// absent from the store.
    fn checkout(&self, path: &EntryPath, fingerprint: &Fingerprint) -> StagehandResult<()>;

    /// Check whether the store holds content for the fingerprint
    fn contains(&self, fingerprint: &Fingerprint) -> bool;
}

/// Local filesystem cache
///
/// Content lives under `root/xx/yyyy...` where `xxyyyy...` is the hex
/// fingerprint, the usual two-level content-addressable layout.
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    /// Open (creating if needed) a cache rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> StagehandResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The cache's root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        let hex = fingerprint.as_str();
        if hex.len() > 2 {
            self.root.join(&hex[..2]).join(&hex[2..])
        } else {
            self.root.join(hex)
        }
    }
}

impl Cache for LocalCache {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn fingerprint_of(&self, path: &EntryPath) -> StagehandResult<Option<Fingerprint>> {
        let local = path.as_local();
        if !local.exists() {
            return Ok(None);
        }
        Ok(Some(Fingerprint::of_file(local)?))
    }

    fn save(&self, path: &EntryPath) -> StagehandResult<Fingerprint> {
        let local = path.as_local();
        let fingerprint = Fingerprint::of_file(local)?;
        let store = self.store_path(&fingerprint);

        if store.exists() {
            // Same key means byte-identical content; nothing to transfer
            debug!("'{}' already cached as '{}'", path, fingerprint);
            return Ok(fingerprint);
        }

        if let Some(parent) = store.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Stage into the cache root and persist, so concurrent saves of the
        // same fingerprint land whole (last writer wins with identical bytes)
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        let mut src = std::fs::File::open(local)?;
        io::copy(&mut src, &mut tmp)?;
        tmp.persist(&store).map_err(|e| e.error)?;

        debug!("saved '{}' to cache as '{}'", path, fingerprint);
        Ok(fingerprint)
    }

    fn checkout(&self, path: &EntryPath, fingerprint: &Fingerprint) -> StagehandResult<()> {
        let store = self.store_path(fingerprint);
        if !store.exists() {
            return Err(StagehandError::NotInCache {
                path: path.raw().to_string(),
                fingerprint: fingerprint.to_string(),
            });
        }

        let local = path.as_local();
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&store, local)?;

        debug!("checked out '{}' from cache entry '{}'", path, fingerprint);
        Ok(())
    }

    fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.store_path(fingerprint).exists()
    }
}
