//! Error types for the triage pipeline.
//!
//! [`TriageError`] stops the run. [`ToolError`] only affects the record
//! that was waiting on an external tool.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for triage operations
pub type TriageResult<T> = Result<T, TriageError>;

/// Fatal errors: the log format, the corpus layout, or the classifier
/// itself is not what the pipeline expects.
#[derive(Error, Debug)]
pub enum TriageError {
    /// A log line carries no `path:line:col[-col]:` locator
    #[error("No `path:line:col:` locator in log line: {line:?}")]
    MalformedLocator { line: String },

    /// Several checkout files match the log's file name and the log text
    /// does not name one of them
    #[error("Ambiguous source for {filename} in {log}: {candidates} candidates, no embedded path")]
    AmbiguousSource {
        log: PathBuf,
        filename: String,
        candidates: usize,
    },

    /// No checkout file matches the log's file name
    #[error("No source file matching {filename} for log {log}")]
    SourceNotFound { log: PathBuf, filename: String },

    /// Log file name does not follow `<exit>-<file>_<tool>`
    #[error("Unrecognized log file name: {name}")]
    LogName { name: String },

    /// Cross-category counts are inconsistent for a finished project
    #[error("Invariant violated for project {project}: {detail}")]
    InvariantViolation { project: String, detail: String },

    /// A configured project pattern does not compile
    #[error("Invalid pattern {pattern:?} for project {project}: {source}")]
    InvalidPattern {
        project: String,
        pattern: String,
        source: regex::Error,
    },

    /// Configuration file could not be parsed
    #[error("Invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Failed to read a file or directory
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A worker task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl TriageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Recoverable failure of an external tool (oracle or inclusion scanner).
///
/// The affected record keeps its `undefined` category and is flagged for
/// manual follow-up; the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The program could not be started
    #[error("Failed to execute {program}: {message}")]
    Spawn { program: String, message: String },

    /// The program did not finish within its timeout
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// The program exited with a status that signals a tool failure
    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}
