// ==========================================
// SAP Meter Exchange - Reconciliation layer
// ==========================================
// One reconciler per master-data entity. Each row is processed
// independently: resolve the natural identifier, create when absent
// from the store, update only on field change. Row failures
// accumulate and never abort the batch.
//
// Deactivation-of-absent policy (per entity, explicit):
// - meters: YES, the feed is authoritative for active membership
// - users:  YES, the SAP feed is the HR source of truth
// - sites:  NO, sites are referenced by meters and web content
// The policy pass runs in finalize() and only when the run actually
// processed at least one feed file.
// ==========================================

pub mod meter;
pub mod site;
pub mod user;

pub use meter::MeterReconciler;
pub use site::SiteReconciler;
pub use user::UserReconciler;

use crate::domain::types::EntityKind;
use crate::exchange::error::{ExchangeResult, RowError};
use crate::exchange::file_parser::RawRow;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;

// ==========================================
// ReconcileSummary
// ==========================================
/// Aggregated outcome of one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub deactivated: usize,
    pub errors: Vec<RowError>,
}

impl ReconcileSummary {
    pub fn merge(&mut self, other: ReconcileSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.deactivated += other.deactivated;
        self.errors.extend(other.errors);
    }
}

// ==========================================
// EntityReconciler trait
// ==========================================
#[async_trait]
pub trait EntityReconciler: Send + Sync {
    fn entity(&self) -> EntityKind;

    /// Reconcile the rows of one feed file. Natural identifiers
    /// encountered in the feed are added to `seen` for the
    /// finalize() policy pass.
    async fn reconcile_file(
        &self,
        file_name: &str,
        rows: &[RawRow],
        seen: &mut HashSet<String>,
    ) -> ExchangeResult<ReconcileSummary>;

    /// Entity policy pass after all files of the run: deactivation of
    /// identifiers absent from the feed, entity-specific cleanup.
    /// Called only when the run processed at least one file.
    async fn finalize(&self, seen: &HashSet<String>) -> ExchangeResult<ReconcileSummary>;
}

/// Feed date fields arrive as YYYYMMDD (SAP) or YYYY-MM-DD; anything
/// else counts as missing.
pub(crate) fn parse_feed_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}
