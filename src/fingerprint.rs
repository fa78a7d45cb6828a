//! Content Fingerprint Value Object
//!
//! A validated, immutable MD5 digest representing the content of a tracked
//! path or the canonical form of a stage record. Used for change detection
//! and as the key into content-addressable caches.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::StagehandResult;

/// Read buffer size for streamed file digests
const CHUNK_SIZE: usize = 1024 * 1024;

/// Content fingerprint value object
///
/// Wraps a lowercase MD5 hex digest. Immutable once constructed; entries
/// and stages replace their fingerprint rather than mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an existing hex digest string
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Get the hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compute the fingerprint of a byte slice
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Md5::digest(bytes);
        Self(format!("{:x}", digest))
    }

    /// Compute the fingerprint of a reader, streamed in fixed-size chunks
    pub fn of_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    /// Compute the fingerprint of a file's content
    pub fn of_file(path: &Path) -> io::Result<Self> {
        Self::of_reader(File::open(path)?)
    }

    /// Compute the fingerprint of a serializable record's canonical form.
    ///
    /// The record is serialized through `serde_json::Value`, whose object
    /// maps are ordered, so key order in the source struct does not affect
    /// the digest. Fields that skip serialization (e.g. an unset aggregate
    /// fingerprint) are excluded from the canonical form.
    pub fn of_record<T: Serialize>(record: &T) -> StagehandResult<Self> {
        let value = serde_json::to_value(record)?;
        Ok(Self::of_bytes(value.to_string().as_bytes()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
