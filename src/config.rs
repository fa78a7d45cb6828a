//! Cache configuration
//!
//! Deserializable settings naming where each backend kind's cache lives.
//! Only the local cache can be built in-crate; object-store, distributed-fs
//! and networked-fs caches are collaborator implementations registered on
//! [`crate::Backends`] directly via `with_cache`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StagehandError, StagehandResult};

/// Cache location settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory for the local content-addressable cache.
    ///
    /// `None` means no local cache is configured; constructing a
    /// cache-enabled local output will then fail.
    #[serde(default)]
    pub local: Option<PathBuf>,
}

impl CacheConfig {
    /// Configuration with a local cache rooted at `dir`
    pub fn with_local(dir: impl Into<PathBuf>) -> Self {
        Self {
            local: Some(dir.into()),
        }
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> StagehandResult<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&text).map_err(|e| StagehandError::InvalidConfig {
            file: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
