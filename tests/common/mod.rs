//! Common test utilities for Stagehand scenario tests.
//!
//! Provides `TestEnv` - an isolated pipeline directory with a local cache,
//! plus builders for command and data-source stages.

#![allow(dead_code)]

use std::path::Path;

use tempfile::TempDir;

use stagehand::{Backends, Stage};

/// Isolated test environment: a temp pipeline directory with a local
/// content-addressable cache under `.stagehand/cache`.
pub struct TestEnv {
    /// Temporary directory acting as the pipeline root
    pub root: TempDir,
    /// Backend registry with the local cache configured
    pub backends: Backends,
}

impl TestEnv {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let backends = Backends::local(root.path().join(".stagehand/cache")).unwrap();
        Self { root, backends }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn write_file(&self, name: &str, content: &str) {
        std::fs::write(self.path().join(name), content).unwrap();
    }

    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.path().join(name)).unwrap()
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.path().join(name).exists()
    }

    /// Build a command stage with cached outputs
    pub fn command_stage(&self, cmd: &str, deps: &[&str], outs: &[&str], fname: &str) -> Stage {
        Stage::loads(
            &self.backends,
            Some(cmd.to_string()),
            &owned(deps),
            &owned(outs),
            &[],
            fname,
            self.path(),
        )
        .unwrap()
    }

    /// Build a data-source stage (no command, outputs verified not produced)
    pub fn data_stage(&self, outs: &[&str], fname: &str) -> Stage {
        Stage::loads(
            &self.backends,
            None,
            &[],
            &owned(outs),
            &[],
            fname,
            self.path(),
        )
        .unwrap()
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
