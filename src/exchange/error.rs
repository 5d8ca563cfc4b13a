// ==========================================
// SAP Meter Exchange - Exchange error types
// ==========================================
// Taxonomy per the batch error policy:
// - AlreadyRunning: lock held, skip the run (info level, not a failure)
// - MalformedFile: whole file unreadable, skip file, never archive
// - RowError: single row invalid, accumulate and continue
// - store / lock infrastructure failures abort the whole run
// Tooling: thiserror derive macro
// ==========================================

use crate::repository::error::RepositoryError;
use std::fmt;
use thiserror::Error;

/// Exchange layer error type
#[derive(Error, Debug)]
pub enum ExchangeError {
    // ===== Run control =====
    #[error("job already running: {job_key}")]
    AlreadyRunning { job_key: String },

    #[error("lock infrastructure failure: {0}")]
    LockInfra(String),

    // ===== File level =====
    #[error("malformed file {file}: {message}")]
    MalformedFile { file: String, message: String },

    #[error("archive failed for {file}: {message}")]
    ArchiveFailed { file: String, message: String },

    // ===== Infrastructure =====
    #[error("store unavailable: {0}")]
    Store(#[from] RepositoryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ===== Generic =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias
pub type ExchangeResult<T> = Result<T, ExchangeError>;

// ==========================================
// RowError - accumulated per-row failure
// ==========================================
// Carries enough context (file, row, reason) for operator diagnosis
// in the run summary. Never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub file: String,
    pub row: usize,
    pub reason: String,
}

impl RowError {
    pub fn new(file: &str, row: usize, reason: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            row,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}: {}", self.file, self.row, self.reason)
    }
}
