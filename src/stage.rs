//! Stage: a named, reproducible unit of work
//!
//! A stage binds a command to its declared dependencies and outputs,
//! detects whether any of that world drifted since the last recorded run,
//! and re-executes the command when it did. Reproduction follows a strict
//! order: remove stale outputs, run the command, save fresh fingerprints
//! (populating caches), persist the descriptor.
//!
//! Stages with no command are data sources: their outputs are verified to
//! exist rather than produced. Stages with a command but no dependencies
//! are callbacks: nothing can prove they didn't change, so they are
//! considered changed on every evaluation.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backends::Backends;
use crate::entry::{Entry, EntryDrift, EntryRecord};
use crate::error::{StagehandError, StagehandResult};
use crate::exec::{ExecContext, Executor};
use crate::fingerprint::Fingerprint;

/// Serialized form of a stage descriptor.
///
/// The aggregate fingerprint (`md5`) is computed over this record with the
/// `md5` field itself unset, so the digest covers exactly the serialized
/// command, dependencies and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageRecord {
    /// Command text; `None` marks a data-source stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    /// Declared dependencies, in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps: Option<Vec<EntryRecord>>,

    /// Declared outputs, in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outs: Option<Vec<EntryRecord>>,

    /// Aggregate fingerprint at last successful save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<Fingerprint>,
}

/// Per-stage drift report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageStatus {
    /// Drifted dependencies, keyed by path
    pub deps: BTreeMap<String, EntryDrift>,
    /// Drifted outputs, keyed by path
    pub outs: BTreeMap<String, EntryDrift>,
    /// The descriptor's aggregate fingerprint no longer matches
    pub checksum_changed: bool,
    /// Callback stage: considered changed on every evaluation
    pub always_changed: bool,
}

impl StageStatus {
    /// True when nothing drifted and no stage-level signal fired
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
            && self.outs.is_empty()
            && !self.checksum_changed
            && !self.always_changed
    }
}

/// A reproducible unit of work
#[derive(Debug, Clone)]
pub struct Stage {
    path: PathBuf,
    cwd: PathBuf,
    cmd: Option<String>,
    deps: Vec<Entry>,
    outs: Vec<Entry>,
    md5: Option<Fingerprint>,
}

impl Stage {
    /// Default descriptor file name
    pub const STAGE_FILE: &'static str = "Stagefile";
    /// Descriptor file suffix for named stages
    pub const STAGE_FILE_SUFFIX: &'static str = ".stage";

    /// Check whether a path looks like a stage descriptor file
    pub fn is_stage_file(path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        name == Self::STAGE_FILE || name.ends_with(Self::STAGE_FILE_SUFFIX)
    }

    /// Build a stage from a descriptor record.
    ///
    /// `path` is where the descriptor lives (or will live); the stage's
    /// working directory is its containing directory.
    pub fn loadd(backends: &Backends, record: StageRecord, path: &Path) -> StagehandResult<Self> {
        let path = std::path::absolute(path)?;
        let cwd = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        let mut deps = Vec::new();
        for rec in record.deps.unwrap_or_default() {
            deps.push(Entry::dependency(rec.path, &cwd, backends)?.with_info(rec.md5));
        }

        let mut outs = Vec::new();
        for rec in record.outs.unwrap_or_default() {
            let use_cache = rec.cache.unwrap_or(true);
            outs.push(Entry::output(rec.path, &cwd, use_cache, backends)?.with_info(rec.md5));
        }

        Ok(Self {
            path,
            cwd,
            cmd: record.cmd,
            deps,
            outs,
            md5: record.md5,
        })
    }

    /// Define a new pipeline step directly.
    ///
    /// `outs` are cached outputs, `outs_no_cache` are tracked but never
    /// mirrored. The descriptor will live at `cwd/fname`.
    pub fn loads(
        backends: &Backends,
        cmd: Option<String>,
        deps: &[String],
        outs: &[String],
        outs_no_cache: &[String],
        fname: &str,
        cwd: &Path,
    ) -> StagehandResult<Self> {
        let cwd = std::path::absolute(cwd)?;
        let path = cwd.join(fname);

        let mut entries = Vec::new();
        for out in outs {
            entries.push(Entry::output(out, &cwd, true, backends)?);
        }
        for out in outs_no_cache {
            entries.push(Entry::output(out, &cwd, false, backends)?);
        }

        let mut dep_entries = Vec::new();
        for dep in deps {
            dep_entries.push(Entry::dependency(dep, &cwd, backends)?);
        }

        Ok(Self {
            path,
            cwd,
            cmd,
            deps: dep_entries,
            outs: entries,
            md5: None,
        })
    }

    /// Load a stage from its descriptor file.
    ///
    /// Structural validation failures surface as
    /// [`StagehandError::StageFileFormat`], distinct from IO errors.
    pub fn load(backends: &Backends, path: &Path) -> StagehandResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let record: StageRecord =
            serde_yaml_ng::from_str(&text).map_err(|e| StagehandError::StageFileFormat {
                file: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Self::loadd(backends, record, path)
    }

    /// Descriptor location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Working directory for command execution
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Command text, if any
    pub fn cmd(&self) -> Option<&str> {
        self.cmd.as_deref()
    }

    /// Declared dependencies, in order
    pub fn deps(&self) -> &[Entry] {
        &self.deps
    }

    /// Declared outputs, in order
    pub fn outs(&self) -> &[Entry] {
        &self.outs
    }

    /// Aggregate fingerprint recorded at last successful save
    pub fn md5(&self) -> Option<&Fingerprint> {
        self.md5.as_ref()
    }

    /// Descriptor path relative to the process working directory, for
    /// reporting
    pub fn relpath(&self) -> PathBuf {
        std::env::current_dir()
            .ok()
            .and_then(|cur| self.path.strip_prefix(&cur).map(Path::to_path_buf).ok())
            .unwrap_or_else(|| self.path.clone())
    }

    /// True for stages with no command (externally supplied data)
    pub fn is_data_source(&self) -> bool {
        self.cmd.is_none()
    }

    /// True for stages with a command but no dependencies; nothing can
    /// prove such a stage didn't change
    pub fn is_callback(&self) -> bool {
        !self.is_data_source() && self.deps.is_empty()
    }

    /// Serialize to a descriptor record, recomputing the aggregate
    /// fingerprint from the current command, dependencies and outputs
    pub fn dumpd(&self) -> StagehandResult<StageRecord> {
        let mut record = StageRecord {
            cmd: self.cmd.clone(),
            deps: if self.deps.is_empty() {
                None
            } else {
                Some(self.deps.iter().map(Entry::dumpd).collect())
            },
            outs: if self.outs.is_empty() {
                None
            } else {
                Some(self.outs.iter().map(Entry::dumpd).collect())
            },
            md5: None,
        };
        record.md5 = Some(Fingerprint::of_record(&record)?);
        Ok(record)
    }

    /// Write the descriptor to disk atomically
    pub fn dump(&self) -> StagehandResult<()> {
        let record = self.dumpd()?;
        let yaml = serde_yaml_ng::to_string(&record)?;
        atomic_write(&self.path, yaml.as_bytes())?;
        debug!("saved stage file '{}'", self.relpath().display());
        Ok(())
    }

    /// Whether the stored aggregate fingerprint no longer matches the
    /// recomputed one.
    ///
    /// A stored `None` reads as "no known-good state" and therefore not a
    /// change — an intentionally permissive backward-compatibility rule; a
    /// new stage always saves a fresh fingerprint right after its first
    /// run.
    pub fn changed_md5(&self) -> StagehandResult<bool> {
        let Some(stored) = &self.md5 else {
            return Ok(false);
        };
        let current = self.dumpd()?.md5;
        if current.as_ref() == Some(stored) {
            return Ok(false);
        }
        debug!(
            "stage file '{}' md5 changed (expected '{}', actual '{:?}')",
            self.relpath().display(),
            stored,
            current
        );
        Ok(true)
    }

    /// Decide whether the stage needs reproduction.
    ///
    /// All three signals — callback status, per-entry drift, aggregate
    /// fingerprint — are evaluated even once one fires, so the debug log
    /// names every reason.
    pub fn changed(&self) -> StagehandResult<bool> {
        let mut ret = false;

        if self.is_callback() {
            debug!(
                "stage '{}' is a callback, considering it changed",
                self.relpath().display()
            );
            ret = true;
        }

        for entry in self.outs.iter().chain(self.deps.iter()) {
            if entry.changed()? {
                ret = true;
            }
        }

        if self.changed_md5()? {
            ret = true;
        }

        if ret {
            debug!("stage '{}' changed", self.relpath().display());
        } else {
            debug!("stage '{}' didn't change", self.relpath().display());
        }
        Ok(ret)
    }

    /// Remove all outputs from their backends
    pub fn remove_outs(&self, ignore_remove: bool) -> StagehandResult<()> {
        for out in &self.outs {
            out.remove(ignore_remove)?;
        }
        Ok(())
    }

    /// Destroy the stage: best-effort output removal, then descriptor
    /// deletion. Explicit and caller-invoked, never automatic.
    pub fn remove(&self) -> StagehandResult<()> {
        self.remove_outs(true)?;
        std::fs::remove_file(&self.path)?;
        Ok(())
    }

    /// Refresh every entry's fingerprint (populating caches), recompute
    /// the aggregate fingerprint and persist the descriptor
    pub fn save(&mut self) -> StagehandResult<()> {
        for dep in &mut self.deps {
            dep.save()?;
        }
        for out in &mut self.outs {
            out.save()?;
        }
        self.md5 = self.dumpd()?.md5;
        self.dump()
    }

    /// Re-run the stage if it changed (or unconditionally when forced).
    ///
    /// Returns `Ok(false)` for the unchanged no-op case. For command
    /// stages, every output is removed before execution so the command
    /// never observes stale content; removal failures there are real
    /// errors. Nothing is persisted when the command fails.
    pub fn reproduce(&mut self, force: bool, executor: &dyn Executor) -> StagehandResult<bool> {
        if !self.changed()? && !force {
            debug!(
                "stage '{}' didn't change, skipping reproduction",
                self.relpath().display()
            );
            return Ok(false);
        }

        if self.cmd.is_some() {
            self.remove_outs(false)?;
        }

        self.run(executor)?;
        Ok(true)
    }

    fn run(&mut self, executor: &dyn Executor) -> StagehandResult<()> {
        if let Some(cmd) = self.cmd.clone() {
            info!("reproducing '{}': {}", self.relpath().display(), cmd);

            let ctx = ExecContext::inherit(&self.cwd);
            let code = executor.run(&cmd, &ctx)?;
            if code != 0 {
                return Err(StagehandError::CommandFailed {
                    stage: self.relpath(),
                    cmd,
                    code,
                });
            }

            self.save()?;
            debug!("'{}' was reproduced", self.relpath().display());
        } else {
            info!(
                "verifying data sources in '{}'",
                self.relpath().display()
            );
            self.check_missing_outputs()?;
            self.save()?;
        }
        Ok(())
    }

    /// Verify that every declared output of a data-source stage exists,
    /// reporting all missing paths in a single error
    fn check_missing_outputs(&self) -> StagehandResult<()> {
        let missing: Vec<String> = self
            .outs
            .iter()
            .filter(|out| !out.exists())
            .map(|out| out.path().raw().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(StagehandError::MissingDataSource { paths: missing })
        }
    }

    /// Restore outputs (never dependencies) from their caches, independent
    /// of whether the stage is currently changed
    pub fn checkout(&self) -> StagehandResult<()> {
        for out in &self.outs {
            out.checkout()?;
        }
        Ok(())
    }

    /// Report what changed, keyed by the stage's relative path.
    ///
    /// Empty for a fully unchanged, non-callback stage.
    pub fn status(&self) -> StagehandResult<BTreeMap<String, StageStatus>> {
        let mut stage_status = StageStatus::default();

        for dep in &self.deps {
            stage_status.deps.extend(dep.status()?);
        }
        for out in &self.outs {
            stage_status.outs.extend(out.status()?);
        }
        stage_status.checksum_changed = self.changed_md5()?;
        stage_status.always_changed = self.is_callback();

        let mut ret = BTreeMap::new();
        if !stage_status.is_empty() {
            ret.insert(self.relpath().display().to_string(), stage_status);
        }
        Ok(ret)
    }
}

/// Write content through a temp file in the target directory, then rename
fn atomic_write(path: &Path, content: &[u8]) -> StagehandResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
