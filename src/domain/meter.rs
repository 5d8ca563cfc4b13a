// ==========================================
// SAP Meter Exchange - Meter master record
// ==========================================
// Natural key: meter_code (unique within the store, assigned by SAP).
// last_seen_at is owned by the polling layer; the import never
// touches it.
// ==========================================

use crate::domain::types::RecordStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Meter master record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meter {
    pub meter_code: String,
    pub serial_number: Option<String>,
    /// Owning site; empty while the meter is unassigned
    pub site_code: Option<String>,
    pub customer_name: Option<String>,
    pub contract_number: Option<String>,
    /// SAP measuring point number; 0 means "not billed"
    pub measuring_point: i64,
    /// Billing grouping keys for the export
    pub business_entity: Option<String>,
    pub company: Option<String>,
    pub status: RecordStatus,
    /// Read-out date from the SAP contract
    pub ro_date: Option<NaiveDate>,
    /// Last contact from the device, maintained by the polling layer
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meter {
    /// True when the meter has no owning site
    pub fn is_unassigned(&self) -> bool {
        self.site_code.as_deref().map_or(true, |s| s.trim().is_empty())
    }

    /// Field-level comparison used by the reconciler to decide whether
    /// a feed row actually changes anything. Timestamps and
    /// last_seen_at are deliberately excluded.
    pub fn differs_from(&self, other: &Meter) -> bool {
        self.serial_number != other.serial_number
            || self.site_code != other.site_code
            || self.customer_name != other.customer_name
            || self.contract_number != other.contract_number
            || self.measuring_point != other.measuring_point
            || self.business_entity != other.business_entity
            || self.company != other.company
            || self.status != other.status
            || self.ro_date != other.ro_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Meter {
        Meter {
            meter_code: "MTR-001".to_string(),
            serial_number: Some("SN1".to_string()),
            site_code: Some("SITE-A".to_string()),
            customer_name: Some("Acme".to_string()),
            contract_number: Some("C-100".to_string()),
            measuring_point: 42,
            business_entity: Some("BE1".to_string()),
            company: Some("CO1".to_string()),
            status: RecordStatus::Active,
            ro_date: None,
            last_seen_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_differs_ignores_timestamps() {
        let a = sample();
        let mut b = a.clone();
        b.updated_at = b.updated_at + chrono::Duration::days(1);
        b.last_seen_at = Some(Utc::now());
        assert!(!a.differs_from(&b));

        b.customer_name = Some("Other".to_string());
        assert!(a.differs_from(&b));
    }

    #[test]
    fn test_unassigned() {
        let mut m = sample();
        assert!(!m.is_unassigned());
        m.site_code = Some("  ".to_string());
        assert!(m.is_unassigned());
        m.site_code = None;
        assert!(m.is_unassigned());
    }
}
