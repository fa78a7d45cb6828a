//! Stagehand - reproducible pipeline stage core
//!
//! Stagehand defines a unit of work (a [`Stage`]) that produces outputs
//! from a command and a set of declared dependencies, detects whether that
//! world drifted since the last recorded run, and re-executes the command
//! when needed. Outputs are tracked by content fingerprint and mirrored
//! into a content-addressable cache, which may be local or backed by a
//! remote store plugged in behind the [`Remote`] and [`Cache`] traits.
//!
//! Multi-stage scheduling, the wire protocols of remote stores, and the
//! command-line layer live outside this crate; stages consume them as
//! collaborators.

pub mod backends;
pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod exec;
pub mod fingerprint;
pub mod remote;
pub mod stage;
pub mod testing;

// Re-exports for convenience
pub use backends::Backends;
pub use cache::{Cache, LocalCache};
pub use config::CacheConfig;
pub use entry::{Entry, EntryDrift, EntryRecord, EntryRole};
pub use error::{StagehandError, StagehandResult};
pub use exec::{ExecContext, Executor, ShellExecutor};
pub use fingerprint::Fingerprint;
pub use remote::{BackendKind, EntryPath, LocalRemote, Remote};
pub use stage::{Stage, StageRecord, StageStatus};
