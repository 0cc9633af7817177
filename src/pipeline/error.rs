//! Error types for the ingestion pipeline.
//!
//! Only [`PipelineError::RootMissing`] and [`PipelineError::Config`] are
//! meant to stop the process. Everything else describes a single label and
//! is folded into an [`ItemOutcome`](super::ItemOutcome) by the controller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from lock marker operations.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("{path} is already locked")]
    AlreadyLocked { path: PathBuf },

    #[error("Lock marker I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by an extractor itself, as opposed to a failed extraction.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to start extractor '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot resolve label path {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pipeline error taxonomy.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{path} is already being processed")]
    AlreadyLocked { path: PathBuf },

    #[error("{path} did not stop changing after {samples} samples")]
    UnstableFile { path: PathBuf, samples: u32 },

    #[error("Extraction failed for {path}: {diagnostic}")]
    ExtractionFailure { path: PathBuf, diagnostic: String },

    #[error("{path} exhausted {retries} retries")]
    RetryExhausted { path: PathBuf, retries: u64 },

    #[error("Failed to {op} {path}: {source}")]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Extractor error: {0}")]
    Extractor(#[from] ExtractError),

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Watched root {path} does not exist or is not a directory")]
    RootMissing { path: PathBuf },
}

impl PipelineError {
    pub fn filesystem(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }

    /// True for conditions that should terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Config { .. } | PipelineError::RootMissing { .. }
        )
    }
}

impl From<LockError> for PipelineError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::AlreadyLocked { path } => PipelineError::AlreadyLocked { path },
            LockError::Io { path, source } => PipelineError::Filesystem {
                op: "lock",
                path,
                source,
            },
        }
    }
}
