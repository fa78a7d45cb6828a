//! Process executor
//!
//! Commands run through an explicit execution context (working directory,
//! environment snapshot, shell) rather than reading ambient process state
//! inside the run path, so reproduction is deterministic and testable with
//! a fake executor.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use crate::error::StagehandResult;

/// Explicit context a command runs in
#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Working directory for the command
    pub cwd: PathBuf,
    /// Shell used to interpret the command text
    pub shell: PathBuf,
    /// Environment the command sees
    pub env: Vec<(OsString, OsString)>,
}

impl ExecContext {
    /// Snapshot the ambient environment and `$SHELL` (falling back to
    /// `/bin/sh`) for a command running in `cwd`
    pub fn inherit(cwd: impl Into<PathBuf>) -> Self {
        let shell = std::env::var_os("SHELL")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/bin/sh"));
        Self {
            cwd: cwd.into(),
            shell,
            env: std::env::vars_os().collect(),
        }
    }

    /// Replace the shell
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Replace the environment
    pub fn with_env(mut self, env: Vec<(OsString, OsString)>) -> Self {
        self.env = env;
        self
    }
}

/// Runs a command string to completion and reports its exit code.
///
/// A non-zero exit code is data for the caller, not an error; only failing
/// to run the command at all is an error.
pub trait Executor {
    /// Run `cmd` in the given context, blocking until it exits
    fn run(&self, cmd: &str, ctx: &ExecContext) -> StagehandResult<i32>;
}

/// Executor backed by the system shell
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    /// Create a new ShellExecutor instance
    pub fn new() -> Self {
        Self
    }
}

impl Executor for ShellExecutor {
    fn run(&self, cmd: &str, ctx: &ExecContext) -> StagehandResult<i32> {
        let status = Command::new(&ctx.shell)
            .arg("-c")
            .arg(cmd)
            .current_dir(&ctx.cwd)
            .env_clear()
            .envs(ctx.env.iter().map(|(k, v)| (k, v)))
            .status()?;
        // Terminated by signal reports as -1
        Ok(status.code().unwrap_or(-1))
    }
}
