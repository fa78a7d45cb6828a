//! Tracked entries (dependencies and outputs)
//!
//! An `Entry` is a tracked path plus its last recorded content fingerprint
//! and a handle to the backend the path lives on. Dependencies are
//! read-only inputs; outputs are produced artifacts that may additionally
//! be mirrored into a content-addressable cache.
//!
//! Every backend differs only in how fingerprints are computed and how
//! content moves — never in when those operations run — so the stage state
//! machine drives deps and outs through one shared
//! `changed`/`save`/`checkout`/`remove`/`status` contract.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backends::Backends;
use crate::cache::Cache;
use crate::error::{StagehandError, StagehandResult};
use crate::fingerprint::Fingerprint;
use crate::remote::{EntryPath, Remote};

/// Whether an entry is a read-only input or a produced artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRole {
    /// Read-only input to the stage
    Dependency,
    /// Artifact produced by the stage
    Output {
        /// Mirror content into the backend's cache on save
        use_cache: bool,
    },
}

/// How an entry has drifted from its recorded state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDrift {
    /// The path no longer exists on its backend
    Deleted,
    /// No fingerprint was ever recorded for the path
    New,
    /// Current content differs from the recorded fingerprint
    Modified,
    /// Content matches but the cache no longer holds the fingerprint
    NotInCache,
}

impl fmt::Display for EntryDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deleted => "deleted",
            Self::New => "new",
            Self::Modified => "modified",
            Self::NotInCache => "not in cache",
        };
        write!(f, "{}", name)
    }
}

/// Serialized form of an entry inside a stage descriptor.
///
/// Key order is stable (struct field order); the `cache` flag appears only
/// on output records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Path exactly as written in the descriptor
    pub path: String,

    /// Last recorded content fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<Fingerprint>,

    /// Output-only: whether the entry is mirrored into a cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
}

/// A tracked path with a fingerprint and a backend handle
#[derive(Clone)]
pub struct Entry {
    path: EntryPath,
    info: Option<Fingerprint>,
    remote: Arc<dyn Remote>,
    cache: Option<Arc<dyn Cache>>,
    role: EntryRole,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("path", &self.path)
            .field("info", &self.info)
            .field("role", &self.role)
            .finish()
    }
}

impl Entry {
    /// Create a dependency entry
    pub fn dependency(
        raw: impl Into<String>,
        cwd: &Path,
        backends: &Backends,
    ) -> StagehandResult<Self> {
        let path = EntryPath::parse(raw, cwd);
        let remote = backends
            .remote(path.kind())
            .ok_or(StagehandError::NoRemote { kind: path.kind() })?;
        Ok(Self {
            path,
            info: None,
            remote,
            cache: None,
            role: EntryRole::Dependency,
        })
    }

    /// Create an output entry.
    ///
    /// Fails with [`StagehandError::NoCache`] when `use_cache` is set but
    /// no cache is configured for the path's backend kind — a silently
    /// uncached output would break the reproducibility guarantee.
    pub fn output(
        raw: impl Into<String>,
        cwd: &Path,
        use_cache: bool,
        backends: &Backends,
    ) -> StagehandResult<Self> {
        let path = EntryPath::parse(raw, cwd);
        let remote = backends
            .remote(path.kind())
            .ok_or(StagehandError::NoRemote { kind: path.kind() })?;
        let cache = if use_cache {
            Some(
                backends
                    .cache(path.kind())
                    .ok_or(StagehandError::NoCache { kind: path.kind() })?,
            )
        } else {
            None
        };
        Ok(Self {
            path,
            info: None,
            remote,
            cache,
            role: EntryRole::Output { use_cache },
        })
    }

    /// Attach a previously recorded fingerprint (descriptor loading)
    pub fn with_info(mut self, info: Option<Fingerprint>) -> Self {
        self.info = info;
        self
    }

    /// The entry's tracked path
    pub fn path(&self) -> &EntryPath {
        &self.path
    }

    /// The recorded fingerprint, if any
    pub fn info(&self) -> Option<&Fingerprint> {
        self.info.as_ref()
    }

    /// The entry's role
    pub fn role(&self) -> EntryRole {
        self.role
    }

    /// True for output entries
    pub fn is_output(&self) -> bool {
        matches!(self.role, EntryRole::Output { .. })
    }

    /// True for outputs mirrored into a cache
    pub fn use_cache(&self) -> bool {
        matches!(self.role, EntryRole::Output { use_cache: true })
    }

    /// Check whether content currently exists at the path
    pub fn exists(&self) -> bool {
        self.remote.exists(&self.path)
    }

    /// The fingerprint of the content currently observable at the path.
    ///
    /// Cached outputs report what their cache would key the content as;
    /// everything else is computed directly from the backend.
    fn current(&self) -> StagehandResult<Option<Fingerprint>> {
        match &self.cache {
            Some(cache) => cache.fingerprint_of(&self.path),
            None => self.remote.fingerprint_of(&self.path),
        }
    }

    /// Compare observable state against the recorded fingerprint
    pub fn changed(&self) -> StagehandResult<bool> {
        if !self.exists() {
            debug!("'{}' changed: deleted", self.path);
            return Ok(true);
        }
        let Some(recorded) = &self.info else {
            debug!("'{}' changed: no recorded fingerprint", self.path);
            return Ok(true);
        };
        let current = self.current()?;
        let changed = current.as_ref() != Some(recorded);
        if changed {
            debug!(
                "'{}' changed: expected '{}', actual '{:?}'",
                self.path, recorded, current
            );
        }
        Ok(changed)
    }

    /// Recompute and record the fingerprint; cached outputs additionally
    /// push current content into their cache.
    ///
    /// Call only once the backend content is in its final state for the
    /// run.
    pub fn save(&mut self) -> StagehandResult<()> {
        let info = self
            .remote
            .fingerprint_of(&self.path)?
            .ok_or_else(|| StagehandError::MissingPath {
                path: self.path.raw().to_string(),
            })?;
        self.info = Some(info);

        if let Some(cache) = &self.cache {
            self.info = Some(cache.save(&self.path)?);
        }
        Ok(())
    }

    /// Restore content from the cache entry for the recorded fingerprint.
    ///
    /// No-op for dependencies, uncached outputs, and outputs with no
    /// recorded fingerprint. Never mutates the recorded fingerprint.
    pub fn checkout(&self) -> StagehandResult<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        let Some(info) = &self.info else {
            debug!("'{}' has no recorded fingerprint, skipping checkout", self.path);
            return Ok(());
        };
        cache.checkout(&self.path, info)
    }

    /// Delete the backend content at the path.
    ///
    /// A path that is already absent is never an error. With
    /// `ignore_remove` set, removal failures are logged and swallowed
    /// (best-effort cleanup); otherwise they propagate.
    pub fn remove(&self, ignore_remove: bool) -> StagehandResult<()> {
        if !self.exists() {
            return Ok(());
        }
        debug!("removing '{}'", self.path);
        match self.remote.remove(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if ignore_remove => {
                debug!("failed to remove '{}': {}", self.path, err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Serialize to a descriptor record
    pub fn dumpd(&self) -> EntryRecord {
        EntryRecord {
            path: self.path.raw().to_string(),
            md5: self.info.clone(),
            cache: match self.role {
                EntryRole::Dependency => None,
                EntryRole::Output { use_cache } => Some(use_cache),
            },
        }
    }

    /// Describe the entry's drift, keyed by path; empty when unchanged
    pub fn status(&self) -> StagehandResult<BTreeMap<String, EntryDrift>> {
        let mut ret = BTreeMap::new();
        let key = self.path.raw().to_string();

        if !self.exists() {
            ret.insert(key, EntryDrift::Deleted);
        } else if self.info.is_none() {
            ret.insert(key, EntryDrift::New);
        } else if self.changed()? {
            ret.insert(key, EntryDrift::Modified);
        } else if let (Some(cache), Some(info)) = (&self.cache, &self.info) {
            if !cache.contains(info) {
                ret.insert(key, EntryDrift::NotInCache);
            }
        }
        Ok(ret)
    }
}
