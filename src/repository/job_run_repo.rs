// ==========================================
// SAP Meter Exchange - Job run repository
// ==========================================
// Audit trail of pipeline runs. Rows are written once (finalized
// reports only) and pruned by the configured retention.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::job_run::ImportJobRun;
use crate::domain::types::{EntityKind, SourceTier};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// JobRunRepository trait
// ==========================================
#[async_trait]
pub trait JobRunRepository: Send + Sync {
    async fn insert(&self, run: &ImportJobRun) -> RepositoryResult<()>;

    /// Delete runs that started more than `days` days ago. Returns
    /// the number of pruned rows.
    async fn purge_older_than(&self, days: i64) -> RepositoryResult<usize>;

    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportJobRun>>;
}

// ==========================================
// SQLite implementation
// ==========================================
pub struct SqliteJobRunRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobRunRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl JobRunRepository for SqliteJobRunRepository {
    async fn insert(&self, run: &ImportJobRun) -> RepositoryResult<()> {
        let files_json = serde_json::to_string(&run.files)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let errors_json = serde_json::to_string(&run.errors)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let exclusions_json = serde_json::to_string(&run.exclusions)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO import_job_runs (run_id, job_key, entity, source_tier,
                 files_json, created_count, updated_count, deactivated_count,
                 exported_count, error_count, errors_json, exclusions_json,
                 success, skipped, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                run.run_id,
                run.job_key,
                run.entity.map(|e| e.to_string()),
                run.source_tier.map(|t| t.to_string()),
                files_json,
                run.created_count as i64,
                run.updated_count as i64,
                run.deactivated_count as i64,
                run.exported_count as i64,
                run.errors.len() as i64,
                errors_json,
                exclusions_json,
                run.success as i64,
                run.skipped as i64,
                run.started_at.to_rfc3339(),
                run.finished_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn purge_older_than(&self, days: i64) -> RepositoryResult<usize> {
        let threshold = (Utc::now() - Duration::days(days)).to_rfc3339();
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM import_job_runs WHERE started_at < ?1",
            params![threshold],
        )?;
        Ok(deleted)
    }

    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportJobRun>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, job_key, entity, source_tier, files_json,
                    created_count, updated_count, deactivated_count, exported_count,
                    errors_json, exclusions_json, success, skipped, started_at, finished_at
             FROM import_job_runs
             ORDER BY started_at DESC
             LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                let files_json: String = row.get(4)?;
                let errors_json: String = row.get(9)?;
                let exclusions_json: String = row.get(10)?;
                Ok(ImportJobRun {
                    run_id: row.get(0)?,
                    job_key: row.get(1)?,
                    entity: row
                        .get::<_, Option<String>>(2)?
                        .and_then(|s| parse_entity(&s)),
                    source_tier: row
                        .get::<_, Option<String>>(3)?
                        .and_then(|s| parse_tier(&s)),
                    files: serde_json::from_str(&files_json).unwrap_or_default(),
                    created_count: row.get::<_, i64>(5)? as usize,
                    updated_count: row.get::<_, i64>(6)? as usize,
                    deactivated_count: row.get::<_, i64>(7)? as usize,
                    exported_count: row.get::<_, i64>(8)? as usize,
                    errors: serde_json::from_str(&errors_json).unwrap_or_default(),
                    exclusions: serde_json::from_str(&exclusions_json).unwrap_or_default(),
                    success: row.get::<_, i64>(11)? != 0,
                    skipped: row.get::<_, i64>(12)? != 0,
                    started_at: parse_ts(row.get::<_, String>(13)?),
                    finished_at: parse_ts(row.get::<_, String>(14)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}

fn parse_entity(s: &str) -> Option<EntityKind> {
    match s {
        "METER" => Some(EntityKind::Meter),
        "SITE" => Some(EntityKind::Site),
        "USER" => Some(EntityKind::User),
        _ => None,
    }
}

fn parse_tier(s: &str) -> Option<SourceTier> {
    match s {
        "STAGING" => Some(SourceTier::Staging),
        "PRODUCTION" => Some(SourceTier::Production),
        _ => None,
    }
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
