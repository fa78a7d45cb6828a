//! Error types for Stagehand
//!
//! Library errors use `thiserror`; all modules return `StagehandResult<T>`.
//!
//! Drift (an entry or stage being "changed") is never an error — it flows
//! through `changed()`/`status()` return values.

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::BackendKind;

/// Result type alias for Stagehand operations
pub type StagehandResult<T> = Result<T, StagehandError>;

/// Main error type for Stagehand operations
#[derive(Error, Debug)]
pub enum StagehandError {
    /// An output requested caching but no cache is configured for its
    /// backend kind. Raised at entry construction, never deferred.
    #[error("no cache configured for '{kind}' outputs")]
    NoCache { kind: BackendKind },

    /// No remote handle is configured for a path's backend kind
    #[error("no remote configured for '{kind}' paths")]
    NoRemote { kind: BackendKind },

    /// A stage descriptor failed structural validation
    #[error("stage file format error in {file}: {message}")]
    StageFileFormat { file: PathBuf, message: String },

    /// A cache configuration file failed to parse
    #[error("invalid configuration at {file}: {message}")]
    InvalidConfig { file: PathBuf, message: String },

    /// The stage's command exited non-zero
    #[error("stage '{stage}' cmd '{cmd}' failed with exit code {code}")]
    CommandFailed {
        stage: PathBuf,
        cmd: String,
        code: i32,
    },

    /// A data-source stage declared outputs that are absent
    #[error("{}", format_missing_data(.paths))]
    MissingDataSource { paths: Vec<String> },

    /// Checkout asked for a fingerprint the cache does not hold
    #[error("fingerprint '{fingerprint}' for '{path}' not found in cache")]
    NotInCache { path: String, fingerprint: String },

    /// A path that must exist (e.g. a dependency at save time) is missing
    #[error("path does not exist: {path}")]
    MissingPath { path: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization error (canonical fingerprint form)
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_missing_data(paths: &[String]) -> String {
    let noun = if paths.len() == 1 { "source" } else { "sources" };
    format!("missing data {}: {}", noun, paths.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_no_cache() {
        let err = StagehandError::NoCache {
            kind: BackendKind::ObjectStore,
        };
        assert_eq!(err.to_string(), "no cache configured for 's3' outputs");
    }

    #[test]
    fn test_error_display_missing_data_source_singular() {
        let err = StagehandError::MissingDataSource {
            paths: vec!["a.csv".to_string()],
        };
        assert_eq!(err.to_string(), "missing data source: a.csv");
    }

    #[test]
    fn test_error_display_missing_data_source_plural() {
        let err = StagehandError::MissingDataSource {
            paths: vec!["a.csv".to_string(), "b.csv".to_string()],
        };
        assert_eq!(err.to_string(), "missing data sources: a.csv, b.csv");
    }

    #[test]
    fn test_error_display_command_failed() {
        let err = StagehandError::CommandFailed {
            stage: PathBuf::from("train.stage"),
            cmd: "python train.py".to_string(),
            code: 2,
        };
        assert_eq!(
            err.to_string(),
            "stage 'train.stage' cmd 'python train.py' failed with exit code 2"
        );
    }
}
