// ==========================================
// SAP Meter Exchange - Site reconciler
// ==========================================
// Feed columns: site_code, name, address, city, postal_code, status.
// Required: site_code. Status is optional: a present value must map,
// a missing one defaults to ACTIVE on create and keeps the stored
// value on update. Sites are never deactivated by feed absence.
// ==========================================

use crate::config::MappingTables;
use crate::domain::site::Site;
use crate::domain::types::{EntityKind, RecordStatus};
use crate::exchange::error::{ExchangeResult, RowError};
use crate::exchange::file_parser::RawRow;
use crate::exchange::reconcile::{EntityReconciler, ReconcileSummary};
use crate::repository::site_repo::SiteRepository;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

// ==========================================
// SiteReconciler
// ==========================================
pub struct SiteReconciler<R: ?Sized>
where
    R: SiteRepository,
{
    repo: Arc<R>,
    mappings: MappingTables,
}

impl<R: ?Sized> SiteReconciler<R>
where
    R: SiteRepository,
{
    pub fn new(repo: Arc<R>, mappings: MappingTables) -> Self {
        Self { repo, mappings }
    }

    fn row_status(&self, file: &str, row: &RawRow) -> Result<Option<RecordStatus>, RowError> {
        match row.get("status") {
            None => Ok(None),
            Some(raw) => self.mappings.map_status(raw).map(Some).ok_or_else(|| {
                RowError::new(file, row.number, format!("unmapped status code: {raw}"))
            }),
        }
    }
}

#[async_trait]
impl<R: ?Sized> EntityReconciler for SiteReconciler<R>
where
    R: SiteRepository,
{
    fn entity(&self) -> EntityKind {
        EntityKind::Site
    }

    async fn reconcile_file(
        &self,
        file_name: &str,
        rows: &[RawRow],
        seen: &mut HashSet<String>,
    ) -> ExchangeResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        for row in rows {
            let site_code = match row.get("site_code") {
                Some(code) => code.to_string(),
                None => {
                    summary
                        .errors
                        .push(RowError::new(file_name, row.number, "site code missing"));
                    continue;
                }
            };
            seen.insert(site_code.clone());

            let status = match self.row_status(file_name, row) {
                Ok(s) => s,
                Err(e) => {
                    summary.errors.push(e);
                    continue;
                }
            };

            let now = Utc::now();
            match self.repo.find_by_code(&site_code).await? {
                None => {
                    let site = Site {
                        site_code,
                        name: row.get("name").map(str::to_string),
                        address: row.get("address").map(str::to_string),
                        city: row.get("city").map(str::to_string),
                        postal_code: row.get("postal_code").map(str::to_string),
                        status: status.unwrap_or(RecordStatus::Active),
                        created_at: now,
                        updated_at: now,
                    };
                    self.repo.insert(&site).await?;
                    summary.created += 1;
                    debug!(site_code = %site.site_code, "site created");
                }
                Some(existing) => {
                    let merged = Site {
                        site_code,
                        name: row.get("name").map(str::to_string),
                        address: row.get("address").map(str::to_string),
                        city: row.get("city").map(str::to_string),
                        postal_code: row.get("postal_code").map(str::to_string),
                        status: status.unwrap_or(existing.status),
                        created_at: existing.created_at,
                        updated_at: now,
                    };
                    if existing.differs_from(&merged) {
                        self.repo.update(&merged).await?;
                        summary.updated += 1;
                        debug!(site_code = %merged.site_code, "site updated");
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Sites have no absence policy and no cleanup pass.
    async fn finalize(&self, _seen: &HashSet<String>) -> ExchangeResult<ReconcileSummary> {
        Ok(ReconcileSummary::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::repository::site_repo::SqliteSiteRepository;
    use rusqlite::Connection;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn test_repo() -> Arc<SqliteSiteRepository> {
        let conn = Connection::open_in_memory().unwrap();
        db::configure_sqlite_connection(&conn).unwrap();
        db::init_schema(&conn).unwrap();
        Arc::new(SqliteSiteRepository::from_connection(Arc::new(Mutex::new(
            conn,
        ))))
    }

    fn row(number: usize, pairs: &[(&str, &str)]) -> RawRow {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RawRow { number, values }
    }

    #[tokio::test]
    async fn test_create_and_update_only_on_change() {
        let repo = test_repo();
        let reconciler = SiteReconciler::new(repo.clone(), MappingTables::default());
        let mut seen = HashSet::new();

        let rows = vec![row(
            1,
            &[("site_code", "S1"), ("name", "North"), ("city", "Graz")],
        )];
        let summary = reconciler
            .reconcile_file("SITE_LIST.csv", &rows, &mut seen)
            .await
            .unwrap();
        assert_eq!(summary.created, 1);

        // Status was not in the feed: defaults to ACTIVE
        let site = repo.find_by_code("S1").await.unwrap().unwrap();
        assert_eq!(site.status, RecordStatus::Active);

        let summary = reconciler
            .reconcile_file("SITE_LIST.csv", &rows, &mut seen)
            .await
            .unwrap();
        assert_eq!(summary.created, 0);
        assert_eq!(summary.updated, 0);
    }

    #[tokio::test]
    async fn test_absence_never_deactivates_sites() {
        let repo = test_repo();
        let reconciler = SiteReconciler::new(repo.clone(), MappingTables::default());
        let mut seen = HashSet::new();

        let rows = vec![row(1, &[("site_code", "S1"), ("status", "A")])];
        reconciler
            .reconcile_file("SITE_LIST.csv", &rows, &mut seen)
            .await
            .unwrap();

        // Empty feed set for finalize
        let summary = reconciler.finalize(&HashSet::new()).await.unwrap();
        assert_eq!(summary.deactivated, 0);
        let site = repo.find_by_code("S1").await.unwrap().unwrap();
        assert_eq!(site.status, RecordStatus::Active);
    }
}
