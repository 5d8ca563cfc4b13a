// ==========================================
// SAP Meter Exchange - Job run records
// ==========================================
// JobReport is the structured result each pipeline entry point
// returns to the invoking layer (CLI / scheduler wrapper).
// ImportJobRun is its persisted audit form, finalized once at job
// end and pruned by the configured retention.
// ==========================================

use crate::domain::types::{EntityKind, SourceTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_key: String,
    pub entity: Option<EntityKind>,
    pub success: bool,
    /// True when the run was skipped because the lock was held
    pub skipped: bool,
    pub source_tier: Option<SourceTier>,
    /// File names touched this run (imported or written)
    pub files: Vec<String>,
    pub created: usize,
    pub updated: usize,
    pub deactivated: usize,
    pub exported: usize,
    pub errors: Vec<String>,
    /// Export candidates excluded by a validation rule, one entry per
    /// candidate with the failed rule name. Empty for import runs.
    pub exclusions: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    /// Start a report for a job; counts accumulate during the run and
    /// `finish` seals it.
    pub fn start(job_key: &str, entity: Option<EntityKind>) -> Self {
        Self {
            job_key: job_key.to_string(),
            entity,
            success: false,
            skipped: false,
            source_tier: None,
            files: Vec::new(),
            created: 0,
            updated: 0,
            deactivated: 0,
            exported: 0,
            errors: Vec::new(),
            exclusions: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    /// Seal the report. Row/file errors do not flip success; only
    /// whole-run aborts do (the caller sets success=false explicitly
    /// on abort paths).
    pub fn finish(mut self, success: bool) -> Self {
        self.success = success;
        self.finished_at = Utc::now();
        self
    }

    /// Report for a run skipped because the lock was held. Per the
    /// error policy this is an info-level skip, not a failure.
    pub fn skipped(job_key: &str, entity: Option<EntityKind>) -> Self {
        let mut report = Self::start(job_key, entity);
        report.skipped = true;
        report.success = true;
        report.finished_at = Utc::now();
        report
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Persisted audit record of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJobRun {
    pub run_id: String,
    pub job_key: String,
    pub entity: Option<EntityKind>,
    pub source_tier: Option<SourceTier>,
    pub files: Vec<String>,
    pub created_count: usize,
    pub updated_count: usize,
    pub deactivated_count: usize,
    pub exported_count: usize,
    pub errors: Vec<String>,
    pub exclusions: Vec<String>,
    pub success: bool,
    pub skipped: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ImportJobRun {
    /// Build the audit record from a sealed report
    pub fn from_report(report: &JobReport) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            job_key: report.job_key.clone(),
            entity: report.entity,
            source_tier: report.source_tier,
            files: report.files.clone(),
            created_count: report.created,
            updated_count: report.updated,
            deactivated_count: report.deactivated,
            exported_count: report.exported,
            errors: report.errors.clone(),
            exclusions: report.exclusions.clone(),
            success: report.success,
            skipped: report.skipped,
            started_at: report.started_at,
            finished_at: report.finished_at,
        }
    }
}
