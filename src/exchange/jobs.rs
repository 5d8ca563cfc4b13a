// ==========================================
// SAP Meter Exchange - Pipeline entry points
// ==========================================
// One entry point per scheduled job. The scheduler (cron, systemd
// timer) lives outside the process; each call here is one complete
// run: acquire the job lock, resolve the source tier, process every
// file, run the entity policy pass, archive, persist the audit row.
//
// Error policy at this level:
// - lock held            -> skipped report, nothing persisted
// - no matching files    -> successful no-op run, persisted
// - malformed file       -> recorded, file stays put, run continues
// - archive failure      -> recorded, file stays put, run continues
// - store / lock infra   -> whole-run abort (Err), lock released by
//                           the guard drop
// ==========================================

use crate::config::ExchangeConfig;
use crate::db;
use crate::domain::job_run::{ImportJobRun, JobReport};
use crate::domain::types::EntityKind;
use crate::exchange::archiver::Archiver;
use crate::exchange::dirs::DirectoryResolver;
use crate::exchange::error::{ExchangeError, ExchangeResult};
use crate::exchange::export::writer::archive_export_file;
use crate::exchange::export::{ExportValidator, ExportWriter};
use crate::exchange::file_parser::CsvParser;
use crate::exchange::lock::LockManager;
use crate::exchange::reconcile::{
    EntityReconciler, MeterReconciler, SiteReconciler, UserReconciler,
};
use crate::repository::job_run_repo::{JobRunRepository, SqliteJobRunRepository};
use crate::repository::meter_repo::{MeterRepository, SqliteMeterRepository};
use crate::repository::reading_repo::{ReadingRepository, SqliteReadingRepository};
use crate::repository::site_repo::{SiteRepository, SqliteSiteRepository};
use crate::repository::user_repo::{SqliteUserRepository, UserRepository};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Lock key of the reading export job
pub const EXPORT_JOB_KEY: &str = "exportmeterreading";

// ==========================================
// ImportPipeline
// ==========================================
pub struct ImportPipeline {
    config: ExchangeConfig,
    lock: LockManager,
    resolver: DirectoryResolver,
    parser: CsvParser,
    meters: Arc<dyn MeterRepository>,
    sites: Arc<dyn SiteRepository>,
    users: Arc<dyn UserRepository>,
    runs: Arc<dyn JobRunRepository>,
}

impl ImportPipeline {
    /// Open the configured database (bootstrapping the schema on a
    /// fresh file) and assemble the pipeline.
    pub fn open(config: ExchangeConfig) -> ExchangeResult<Self> {
        let conn = db::open_sqlite_connection(&config.database_path)
            .map_err(|e| anyhow::anyhow!("cannot open database {}: {e}", config.database_path))?;
        db::init_schema(&conn)
            .map_err(|e| anyhow::anyhow!("cannot initialize schema: {e}"))?;
        Self::from_connection(config, Arc::new(Mutex::new(conn)))
    }

    /// Assemble the pipeline over an existing connection. Used by
    /// tests and by callers sharing one store across pipelines.
    pub fn from_connection(
        config: ExchangeConfig,
        conn: Arc<Mutex<Connection>>,
    ) -> ExchangeResult<Self> {
        let lock = LockManager::new(&config.lock.lock_dir, config.lock.stale_after_minutes);
        let resolver = DirectoryResolver::new(&config.import)?;
        let parser = CsvParser::new(config.import.delimiter)?;

        Ok(Self {
            lock,
            resolver,
            parser,
            meters: Arc::new(SqliteMeterRepository::from_connection(conn.clone())),
            sites: Arc::new(SqliteSiteRepository::from_connection(conn.clone())),
            users: Arc::new(SqliteUserRepository::from_connection(conn.clone())),
            runs: Arc::new(SqliteJobRunRepository::from_connection(conn)),
            config,
        })
    }

    pub async fn import_meters(&self) -> ExchangeResult<JobReport> {
        let reconciler = MeterReconciler::new(
            self.meters.clone(),
            self.config.mappings.clone(),
            self.config.import.cleanup_unassigned_inactive,
        );
        self.run_import(EntityKind::Meter, self.config.import.meters_enabled, &reconciler)
            .await
    }

    pub async fn import_sites(&self) -> ExchangeResult<JobReport> {
        let reconciler = SiteReconciler::new(self.sites.clone(), self.config.mappings.clone());
        self.run_import(EntityKind::Site, self.config.import.sites_enabled, &reconciler)
            .await
    }

    pub async fn import_users(&self) -> ExchangeResult<JobReport> {
        let reconciler = UserReconciler::new(self.users.clone(), self.config.mappings.clone());
        self.run_import(EntityKind::User, self.config.import.users_enabled, &reconciler)
            .await
    }

    /// One complete import run for an entity
    async fn run_import(
        &self,
        entity: EntityKind,
        enabled: bool,
        reconciler: &dyn EntityReconciler,
    ) -> ExchangeResult<JobReport> {
        let job_key = entity.job_key();

        if !enabled {
            info!(job_key, "import disabled by configuration, skipping");
            return Ok(JobReport::skipped(job_key, Some(entity)));
        }

        // A held lock means another run is in flight: skip without
        // touching the exchange tree and without an audit row.
        let _guard = match self.lock.acquire(job_key) {
            Ok(guard) => guard,
            Err(ExchangeError::AlreadyRunning { .. }) => {
                return Ok(JobReport::skipped(job_key, Some(entity)));
            }
            Err(e) => return Err(e),
        };

        let mut report = JobReport::start(job_key, Some(entity));

        let (tier, files) = match self.resolver.find_source(entity)? {
            Some(found) => found,
            None => {
                info!(job_key, "no feed files, nothing to do");
                let report = report.finish(true);
                self.persist(&report).await?;
                return Ok(report);
            }
        };
        report.source_tier = Some(tier);
        info!(job_key, tier = %tier, files = files.len(), "import run started");

        let schema = entity.feed_schema();
        let archive_dir = self.resolver.archive_dir(entity);
        let mut seen: HashSet<String> = HashSet::new();
        let mut processed = 0usize;

        for file in &files {
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.display().to_string());

            let rows = match self.parser.parse(file, schema) {
                Ok(rows) => rows,
                Err(ExchangeError::MalformedFile { file, message }) => {
                    // The file stays in place for operator inspection
                    warn!(job_key, file, "malformed feed file: {message}");
                    report
                        .errors
                        .push(format!("{file}: malformed file: {message}"));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let summary = reconciler.reconcile_file(&file_name, &rows, &mut seen).await?;
            report.created += summary.created;
            report.updated += summary.updated;
            report.deactivated += summary.deactivated;
            report
                .errors
                .extend(summary.errors.iter().map(|e| e.to_string()));
            report.files.push(file_name.clone());
            processed += 1;

            match Archiver::archive(file, &archive_dir) {
                Ok(_) => {}
                Err(e) => {
                    // Reconciliation is idempotent, so leaving the
                    // file for the next cycle is safe.
                    error!(job_key, file = %file_name, "archive failed: {e}");
                    report.errors.push(format!("{file_name}: archive failed: {e}"));
                }
            }
        }

        // The policy pass must never run on an empty feed set: a run
        // that processed nothing has no authority to deactivate. The
        // same holds for a parseable feed in which not a single row
        // yielded a natural identifier; treating that as "everything
        // is absent" would deactivate the whole store in one cycle.
        if processed > 0 && !seen.is_empty() {
            let summary = reconciler.finalize(&seen).await?;
            report.created += summary.created;
            report.updated += summary.updated;
            report.deactivated += summary.deactivated;
            report
                .errors
                .extend(summary.errors.iter().map(|e| e.to_string()));
        }

        let report = report.finish(true);
        info!(
            job_key,
            created = report.created,
            updated = report.updated,
            deactivated = report.deactivated,
            errors = report.error_count(),
            "import run finished"
        );
        self.persist(&report).await?;
        Ok(report)
    }

    async fn persist(&self, report: &JobReport) -> ExchangeResult<()> {
        self.runs.insert(&ImportJobRun::from_report(report)).await?;
        let pruned = self
            .runs
            .purge_older_than(self.config.run_retention_days)
            .await?;
        if pruned > 0 {
            info!(pruned, "pruned expired job run records");
        }
        Ok(())
    }
}

// ==========================================
// ExportPipeline
// ==========================================
pub struct ExportPipeline {
    config: ExchangeConfig,
    lock: LockManager,
    validator: ExportValidator,
    writer: ExportWriter,
    readings: Arc<dyn ReadingRepository>,
    runs: Arc<dyn JobRunRepository>,
}

impl ExportPipeline {
    pub fn open(config: ExchangeConfig) -> ExchangeResult<Self> {
        let conn = db::open_sqlite_connection(&config.database_path)
            .map_err(|e| anyhow::anyhow!("cannot open database {}: {e}", config.database_path))?;
        db::init_schema(&conn)
            .map_err(|e| anyhow::anyhow!("cannot initialize schema: {e}"))?;
        Ok(Self::from_connection(config, Arc::new(Mutex::new(conn))))
    }

    pub fn from_connection(config: ExchangeConfig, conn: Arc<Mutex<Connection>>) -> Self {
        let lock = LockManager::new(&config.lock.lock_dir, config.lock.stale_after_minutes);
        let validator = ExportValidator::new(config.export.rules.clone());
        let writer = ExportWriter::new(&config.export);

        Self {
            lock,
            validator,
            writer,
            readings: Arc::new(SqliteReadingRepository::from_connection(conn.clone())),
            runs: Arc::new(SqliteJobRunRepository::from_connection(conn)),
            config,
        }
    }

    /// Export the readings of one logical day. The cutoff is the
    /// configured time-of-day on `day`; only the latest reading per
    /// meter at or before the cutoff is considered.
    pub async fn export_readings(&self, day: NaiveDate) -> ExchangeResult<JobReport> {
        if !self.config.export.enabled {
            info!(job_key = EXPORT_JOB_KEY, "export disabled by configuration, skipping");
            return Ok(JobReport::skipped(EXPORT_JOB_KEY, None));
        }

        let _guard = match self.lock.acquire(EXPORT_JOB_KEY) {
            Ok(guard) => guard,
            Err(ExchangeError::AlreadyRunning { .. }) => {
                return Ok(JobReport::skipped(EXPORT_JOB_KEY, None));
            }
            Err(e) => return Err(e),
        };

        let mut report = JobReport::start(EXPORT_JOB_KEY, None);

        // Files from earlier cycles have been picked up by SAP by
        // now; move them aside before writing this cycle's set.
        self.archive_previous()?;

        let cutoff = day.and_time(self.config.export.cutoff_time).and_utc();
        info!(job_key = EXPORT_JOB_KEY, %day, %cutoff, "export run started");

        let candidates = self.readings.candidates_as_of(cutoff).await?;
        let total = candidates.len();
        let (eligible, rejected) = self.validator.partition(candidates, cutoff);
        // Exclusions go on the audit row, one entry per candidate
        report.exclusions = rejected.iter().map(|r| r.to_string()).collect();

        let files = self.writer.write(&eligible, day)?;
        report.exported = eligible.len();
        report.files = files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();

        let report = report.finish(true);
        info!(
            job_key = EXPORT_JOB_KEY,
            candidates = total,
            exported = report.exported,
            excluded = rejected.len(),
            files = report.files.len(),
            "export run finished"
        );
        self.persist(&report).await?;
        Ok(report)
    }

    /// Sweep files left from earlier export runs into the archive.
    /// The archive directory itself may live under the export
    /// directory; only plain files are swept.
    fn archive_previous(&self) -> ExchangeResult<()> {
        let dir = &self.config.export.export_path;
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                let dest = archive_export_file(&path, &self.config.export.archive_path)?;
                info!(file = %path.display(), dest = %dest.display(), "archived consumed export file");
            }
        }
        Ok(())
    }

    async fn persist(&self, report: &JobReport) -> ExchangeResult<()> {
        self.runs.insert(&ImportJobRun::from_report(report)).await?;
        self.runs
            .purge_older_than(self.config.run_retention_days)
            .await?;
        Ok(())
    }
}
