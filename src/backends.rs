//! Backend registry
//!
//! Holds one remote handle and at most one cache per backend kind. Entries
//! pick their handles from here at construction time; a cache-enabled
//! output whose backend kind has no registered cache is a fatal
//! configuration error, raised before any filesystem interaction.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{Cache, LocalCache};
use crate::config::CacheConfig;
use crate::error::StagehandResult;
use crate::remote::{BackendKind, LocalRemote, Remote};

/// Registry of remotes and caches, keyed by backend kind
#[derive(Clone, Default)]
pub struct Backends {
    remotes: HashMap<BackendKind, Arc<dyn Remote>>,
    caches: HashMap<BackendKind, Arc<dyn Cache>>,
}

impl Backends {
    /// Empty registry with the local filesystem remote registered and no
    /// caches configured
    pub fn new() -> Self {
        Self::default().with_remote(Arc::new(LocalRemote::new()))
    }

    /// Local-only registry: filesystem remote plus a local cache rooted at
    /// `cache_dir`
    pub fn local(cache_dir: impl Into<PathBuf>) -> StagehandResult<Self> {
        Ok(Self::new().with_cache(Arc::new(LocalCache::new(cache_dir)?)))
    }

    /// Build a registry from a cache configuration
    pub fn from_config(config: &CacheConfig) -> StagehandResult<Self> {
        let mut backends = Self::new();
        if let Some(dir) = &config.local {
            backends = backends.with_cache(Arc::new(LocalCache::new(dir)?));
        }
        Ok(backends)
    }

    /// Register (or replace) the remote handle for its backend kind
    pub fn with_remote(mut self, remote: Arc<dyn Remote>) -> Self {
        self.remotes.insert(remote.kind(), remote);
        self
    }

    /// Register (or replace) the cache for its backend kind
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.caches.insert(cache.kind(), cache);
        self
    }

    /// The remote handle for a backend kind, if registered
    pub fn remote(&self, kind: BackendKind) -> Option<Arc<dyn Remote>> {
        self.remotes.get(&kind).cloned()
    }

    /// The cache for a backend kind, if configured
    pub fn cache(&self, kind: BackendKind) -> Option<Arc<dyn Cache>> {
        self.caches.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn new_has_local_remote_but_no_cache() {
        let backends = Backends::new();
        assert!(backends.remote(BackendKind::Local).is_some());
        assert!(backends.cache(BackendKind::Local).is_none());
        assert!(backends.remote(BackendKind::ObjectStore).is_none());
    }

    #[test]
    fn local_registers_cache() {
        let dir = tempdir().unwrap();
        let backends = Backends::local(dir.path().join("cache")).unwrap();
        assert!(backends.cache(BackendKind::Local).is_some());
    }

    #[test]
    fn from_config_without_cache_dir_leaves_cache_unset() {
        let backends = Backends::from_config(&CacheConfig::default()).unwrap();
        assert!(backends.cache(BackendKind::Local).is_none());
    }

    #[test]
    fn from_config_with_cache_dir() {
        let dir = tempdir().unwrap();
        let config = CacheConfig {
            local: Some(dir.path().join("cache")),
        };
        let backends = Backends::from_config(&config).unwrap();
        assert!(backends.cache(BackendKind::Local).is_some());
    }
}
