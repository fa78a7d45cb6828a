//! Backend remote handles
//!
//! A `Remote` answers "does this path exist, what is its content
//! fingerprint, remove it" for one storage backend. Entries and stages
//! depend only on the trait, never on a concrete backend, so new backends
//! are added by implementing `Remote` (and `Cache`), not by touching the
//! stage state machine.
//!
//! Only the local filesystem backend ships in-crate. Object-store,
//! distributed-filesystem and networked-filesystem handles are supplied by
//! the embedding application; their wire protocols are out of scope here.

use std::fmt;
use std::path::Path;

use crate::error::StagehandResult;
use crate::fingerprint::Fingerprint;

/// The four storage backend kinds a tracked path can live on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Local filesystem path
    Local,
    /// Object storage (`s3://bucket/key`)
    ObjectStore,
    /// Distributed filesystem (`hdfs://host/path`)
    DistFs,
    /// Networked filesystem (`nfs://host/path`)
    NetFs,
}

impl BackendKind {
    /// Determine the backend kind from a raw path's scheme
    pub fn of(raw: &str) -> Self {
        if raw.starts_with("s3://") {
            Self::ObjectStore
        } else if raw.starts_with("hdfs://") {
            Self::DistFs
        } else if raw.starts_with("nfs://") {
            Self::NetFs
        } else {
            Self::Local
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::ObjectStore => "s3",
            Self::DistFs => "hdfs",
            Self::NetFs => "nfs",
        };
        write!(f, "{}", name)
    }
}

/// A tracked path as written in a stage descriptor, plus its resolution.
///
/// `raw` is preserved byte-for-byte for round-tripping descriptors. Local
/// paths additionally resolve against the stage's working directory; URL
/// paths resolve to themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPath {
    raw: String,
    kind: BackendKind,
    resolved: String,
}

impl EntryPath {
    /// Parse a raw descriptor path, resolving local paths against `cwd`
    pub fn parse(raw: impl Into<String>, cwd: &Path) -> Self {
        let raw = raw.into();
        let kind = BackendKind::of(&raw);
        let resolved = match kind {
            BackendKind::Local => {
                let p = Path::new(&raw);
                if p.is_absolute() {
                    raw.clone()
                } else {
                    cwd.join(p).display().to_string()
                }
            }
            _ => raw.clone(),
        };
        Self {
            raw,
            kind,
            resolved,
        }
    }

    /// The path exactly as written in the descriptor
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Which backend this path lives on
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Backend-unique key for the path (absolute path or full URL)
    pub fn key(&self) -> &str {
        &self.resolved
    }

    /// The resolved location as a filesystem path (meaningful for `Local`
    /// and mounted networked filesystems)
    pub fn as_local(&self) -> &Path {
        Path::new(&self.resolved)
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Abstract backend handle
///
/// One instance per backend kind; shared between every entry on that
/// backend as `Arc<dyn Remote>`.
pub trait Remote: Send + Sync {
    /// The backend kind this handle serves
    fn kind(&self) -> BackendKind;

    /// Check whether content exists at the path
    fn exists(&self, path: &EntryPath) -> bool;

    /// Delete the content at the path
    fn remove(&self, path: &EntryPath) -> StagehandResult<()>;

    /// Compute the fingerprint of the current content, or `None` if the
    /// path does not exist
    fn fingerprint_of(&self, path: &EntryPath) -> StagehandResult<Option<Fingerprint>>;
}

/// Local filesystem backend
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRemote;

impl LocalRemote {
    /// Create a new LocalRemote instance
    pub fn new() -> Self {
        Self
    }
}

impl Remote for LocalRemote {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn exists(&self, path: &EntryPath) -> bool {
        path.as_local().exists()
    }

    fn remove(&self, path: &EntryPath) -> StagehandResult<()> {
        let local = path.as_local();
        if !local.exists() {
            return Ok(());
        }
        if local.is_dir() {
            std::fs::remove_dir_all(local)?;
        } else {
            std::fs::remove_file(local)?;
        }
        Ok(())
    }

    fn fingerprint_of(&self, path: &EntryPath) -> StagehandResult<Option<Fingerprint>> {
        let local = path.as_local();
        if !local.exists() {
            return Ok(None);
        }
        Ok(Some(Fingerprint::of_file(local)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_from_scheme() {
        assert_eq!(BackendKind::of("data/file.csv"), BackendKind::Local);
        assert_eq!(BackendKind::of("/abs/file.csv"), BackendKind::Local);
        assert_eq!(BackendKind::of("s3://bucket/key"), BackendKind::ObjectStore);
        assert_eq!(BackendKind::of("hdfs://nn/path"), BackendKind::DistFs);
        assert_eq!(BackendKind::of("nfs://host/share"), BackendKind::NetFs);
    }

    #[test]
    fn entry_path_resolves_relative_against_cwd() {
        let path = EntryPath::parse("data/file.csv", Path::new("/work"));
        assert_eq!(path.raw(), "data/file.csv");
        assert_eq!(path.key(), "/work/data/file.csv");
        assert_eq!(path.kind(), BackendKind::Local);
    }

    #[test]
    fn entry_path_keeps_urls_unresolved() {
        let path = EntryPath::parse("s3://bucket/key", Path::new("/work"));
        assert_eq!(path.raw(), "s3://bucket/key");
        assert_eq!(path.key(), "s3://bucket/key");
        assert_eq!(path.kind(), BackendKind::ObjectStore);
    }

    #[test]
    fn local_remote_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let remote = LocalRemote::new();
        let path = EntryPath::parse("file.txt", dir.path());

        assert!(!remote.exists(&path));
        assert_eq!(remote.fingerprint_of(&path).unwrap(), None);

        std::fs::write(path.as_local(), "content").unwrap();
        assert!(remote.exists(&path));
        assert_eq!(
            remote.fingerprint_of(&path).unwrap(),
            Some(Fingerprint::of_bytes(b"content"))
        );

        remote.remove(&path).unwrap();
        assert!(!remote.exists(&path));
        // Removing an absent path is not an error
        remote.remove(&path).unwrap();
    }
}
