// ==========================================
// SAP Meter Exchange - Site master record
// ==========================================
// Natural key: site_code. Sites are referenced by meters, so the
// reconciler never deactivates a site on feed absence.
// ==========================================

use crate::domain::types::RecordStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Site master record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub site_code: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Site {
    /// Field comparison excluding timestamps
    pub fn differs_from(&self, other: &Site) -> bool {
        self.name != other.name
            || self.address != other.address
            || self.city != other.city
            || self.postal_code != other.postal_code
            || self.status != other.status
    }
}
