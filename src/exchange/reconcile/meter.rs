// ==========================================
// SAP Meter Exchange - Meter reconciler
// ==========================================
// Feed columns: meter_code, serial_number, site_code, customer_name,
// contract_number, measuring_point, business_entity, company,
// status, ro_date.
// Required: meter_code, status (mapped). Everything else is
// pass-through; an invalid measuring point is a row error, an
// invalid ro_date counts as missing.
// ==========================================

use crate::config::MappingTables;
use crate::domain::meter::Meter;
use crate::domain::types::{EntityKind, RecordStatus};
use crate::exchange::error::{ExchangeResult, RowError};
use crate::exchange::file_parser::RawRow;
use crate::exchange::reconcile::{parse_feed_date, EntityReconciler, ReconcileSummary};
use crate::repository::meter_repo::MeterRepository;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// MeterReconciler
// ==========================================
pub struct MeterReconciler<R: ?Sized>
where
    R: MeterRepository,
{
    repo: Arc<R>,
    mappings: MappingTables,
    /// Run the delete-unassigned-inactive cleanup pass in finalize
    cleanup_unassigned_inactive: bool,
}

impl<R: ?Sized> MeterReconciler<R>
where
    R: MeterRepository,
{
    pub fn new(repo: Arc<R>, mappings: MappingTables, cleanup_unassigned_inactive: bool) -> Self {
        Self {
            repo,
            mappings,
            cleanup_unassigned_inactive,
        }
    }

    /// Map one feed row to a meter candidate. Row-level problems come
    /// back as RowError, never as a batch abort.
    fn row_to_meter(&self, file: &str, row: &RawRow) -> Result<Meter, RowError> {
        let meter_code = row
            .get("meter_code")
            .ok_or_else(|| RowError::new(file, row.number, "meter code missing"))?
            .to_string();

        let status_raw = row
            .get("status")
            .ok_or_else(|| RowError::new(file, row.number, "status missing"))?;
        let status = self.mappings.map_status(status_raw).ok_or_else(|| {
            RowError::new(file, row.number, format!("unmapped status code: {status_raw}"))
        })?;

        let measuring_point = match row.get("measuring_point") {
            None => 0,
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                RowError::new(file, row.number, format!("invalid measuring point: {raw}"))
            })?,
        };

        let now = Utc::now();
        Ok(Meter {
            meter_code,
            serial_number: row.get("serial_number").map(str::to_string),
            site_code: row.get("site_code").map(str::to_string),
            customer_name: row.get("customer_name").map(str::to_string),
            contract_number: row.get("contract_number").map(str::to_string),
            measuring_point,
            business_entity: row.get("business_entity").map(str::to_string),
            company: row.get("company").map(str::to_string),
            status,
            ro_date: row.get("ro_date").and_then(parse_feed_date),
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl<R: ?Sized> EntityReconciler for MeterReconciler<R>
where
    R: MeterRepository,
{
    fn entity(&self) -> EntityKind {
        EntityKind::Meter
    }

    async fn reconcile_file(
        &self,
        file_name: &str,
        rows: &[RawRow],
        seen: &mut HashSet<String>,
    ) -> ExchangeResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        for row in rows {
            // A row with a readable meter code counts as "present in
            // the feed" even if the rest of it fails: a malformed row
            // must not get its meter deactivated by the absence pass.
            if let Some(code) = row.get("meter_code") {
                seen.insert(code.to_string());
            }

            let candidate = match self.row_to_meter(file_name, row) {
                Ok(m) => m,
                Err(e) => {
                    summary.errors.push(e);
                    continue;
                }
            };

            match self.repo.find_by_code(&candidate.meter_code).await? {
                None => {
                    self.repo.insert(&candidate).await?;
                    summary.created += 1;
                    debug!(meter_code = %candidate.meter_code, "meter created");
                }
                Some(existing) => {
                    let mut merged = candidate;
                    merged.created_at = existing.created_at;
                    merged.last_seen_at = existing.last_seen_at;
                    if existing.differs_from(&merged) {
                        merged.updated_at = Utc::now();
                        self.repo.update(&merged).await?;
                        summary.updated += 1;
                        debug!(meter_code = %merged.meter_code, "meter updated");
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn finalize(&self, seen: &HashSet<String>) -> ExchangeResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        // The feed is authoritative: active meters missing from it
        // become inactive.
        for code in self.repo.list_active_codes().await? {
            if !seen.contains(&code) {
                self.repo
                    .set_status(&code, RecordStatus::Inactive)
                    .await?;
                summary.deactivated += 1;
                info!(meter_code = %code, "meter deactivated (absent from feed)");
            }
        }

        if self.cleanup_unassigned_inactive {
            let deleted = self.repo.delete_unassigned_inactive().await?;
            if deleted > 0 {
                info!(deleted, "cleanup removed unassigned inactive meters");
            }
        }

        Ok(summary)
    }
}
