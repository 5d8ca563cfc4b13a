// ==========================================
// SAP Meter Exchange - Export candidate
// ==========================================
// Transient projection built per export run: the latest reading of a
// meter as of the cutoff, joined with the meter attributes the
// validation rules and the billing file need. Never persisted.
// ==========================================

use crate::domain::types::RecordStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A meter-reading row joined with its owning meter, candidate for
/// one (business entity, company) billing file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportCandidate {
    pub meter_code: String,
    pub customer_name: Option<String>,
    pub contract_number: Option<String>,
    pub measuring_point: i64,
    pub business_entity: Option<String>,
    pub company: Option<String>,
    pub status: RecordStatus,
    pub ro_date: Option<NaiveDate>,
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Latest reading with recorded_at <= cutoff
    pub reading_value: f64,
    pub reading_recorded_at: DateTime<Utc>,
}

impl ExportCandidate {
    /// Grouping key for the billing files. Candidates with no
    /// business entity or company fall into a shared UNKNOWN bucket;
    /// in practice such candidates are filtered by validation first.
    pub fn group_key(&self) -> (String, String) {
        (
            self.business_entity
                .clone()
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            self.company.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
        )
    }
}
