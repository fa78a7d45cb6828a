//! Test doubles for the backend and executor contracts
//!
//! In-memory remote/cache pairs stand in for the backends whose wire
//! protocols live outside this crate, and `FakeExecutor` records command
//! invocations without spawning processes. Used by this crate's own tests
//! and available to embedding applications for theirs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::cache::Cache;
use crate::error::{StagehandError, StagehandResult};
use crate::exec::{ExecContext, Executor};
use crate::fingerprint::Fingerprint;
use crate::remote::{BackendKind, EntryPath, Remote};

/// In-memory backend remote.
///
/// Cloning shares the underlying store, so a test can mutate backend state
/// while entries hold their own handle to it.
#[derive(Clone)]
pub struct MemoryRemote {
    kind: BackendKind,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryRemote {
    /// Empty remote serving the given backend kind
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Put content at a path
    pub fn insert(&self, path: &str, content: Vec<u8>) {
        self.files.lock().unwrap().insert(path.to_string(), content);
    }

    /// Drop the content at a path
    pub fn delete(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    /// Read back the content at a path
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

impl Remote for MemoryRemote {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn exists(&self, path: &EntryPath) -> bool {
        self.files.lock().unwrap().contains_key(path.key())
    }

    fn remove(&self, path: &EntryPath) -> StagehandResult<()> {
        self.files.lock().unwrap().remove(path.key());
        Ok(())
    }

    fn fingerprint_of(&self, path: &EntryPath) -> StagehandResult<Option<Fingerprint>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(path.key())
            .map(|bytes| Fingerprint::of_bytes(bytes)))
    }
}

/// In-memory content-addressable cache paired with a [`MemoryRemote`].
///
/// Shares the remote's file map so `save` can read the content currently
/// at a path and `checkout` can write it back.
#[derive(Clone)]
pub struct MemoryCache {
    kind: BackendKind,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    store: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryCache {
    /// Cache serving the same backend kind and file map as `remote`
    pub fn for_remote(remote: &MemoryRemote) -> Self {
        Self {
            kind: remote.kind,
            files: Arc::clone(&remote.files),
            store: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Drop a fingerprint from the store (simulates cache loss)
    pub fn evict(&self, fingerprint: &Fingerprint) {
        self.store.lock().unwrap().remove(fingerprint.as_str());
    }
}

impl Cache for MemoryCache {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn fingerprint_of(&self, path: &EntryPath) -> StagehandResult<Option<Fingerprint>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(path.key())
            .map(|bytes| Fingerprint::of_bytes(bytes)))
    }

    fn save(&self, path: &EntryPath) -> StagehandResult<Fingerprint> {
        let files = self.files.lock().unwrap();
        let content = files
            .get(path.key())
            .ok_or_else(|| StagehandError::MissingPath {
                path: path.raw().to_string(),
            })?;
        let fingerprint = Fingerprint::of_bytes(content);
        self.store
            .lock()
            .unwrap()
            .insert(fingerprint.as_str().to_string(), content.clone());
        Ok(fingerprint)
    }

    fn checkout(&self, path: &EntryPath, fingerprint: &Fingerprint) -> StagehandResult<()> {
        let content = self
            .store
            .lock()
            .unwrap()
            .get(fingerprint.as_str())
            .cloned()
            .ok_or_else(|| StagehandError::NotInCache {
                path: path.raw().to_string(),
                fingerprint: fingerprint.to_string(),
            })?;
        self.files
            .lock()
            .unwrap()
            .insert(path.key().to_string(), content);
        Ok(())
    }

    fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.store.lock().unwrap().contains_key(fingerprint.as_str())
    }
}

/// One recorded executor invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    /// Command text passed to the executor
    pub cmd: String,
    /// Working directory from the execution context
    pub cwd: PathBuf,
}

type ExecEffect = dyn Fn(&ExecContext) + Send + Sync;

/// Executor that records invocations instead of spawning processes
#[derive(Clone)]
pub struct FakeExecutor {
    calls: Arc<Mutex<Vec<ExecCall>>>,
    exit_code: i32,
    effect: Option<Arc<ExecEffect>>,
}

impl FakeExecutor {
    /// Executor whose commands always exit 0
    pub fn succeeding() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            exit_code: 0,
            effect: None,
        }
    }

    /// Executor whose commands always exit with `code`
    pub fn failing(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::succeeding()
        }
    }

    /// Run `effect` on every invocation (e.g. to create output files)
    pub fn with_effect(mut self, effect: impl Fn(&ExecContext) + Send + Sync + 'static) -> Self {
        self.effect = Some(Arc::new(effect));
        self
    }

    /// All invocations so far
    pub fn calls(&self) -> Vec<ExecCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Executor for FakeExecutor {
    fn run(&self, cmd: &str, ctx: &ExecContext) -> StagehandResult<i32> {
        self.calls.lock().unwrap().push(ExecCall {
            cmd: cmd.to_string(),
            cwd: ctx.cwd.clone(),
        });
        if let Some(effect) = &self.effect {
            effect(ctx);
        }
        Ok(self.exit_code)
    }
}
