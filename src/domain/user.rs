// ==========================================
// SAP Meter Exchange - User master record
// ==========================================
// Natural key: username (SAP personnel id). The role field holds the
// internal role vocabulary, produced by the configured role mapping
// table during reconciliation.
// ==========================================

use crate::domain::types::RecordStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User master record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// Internal role, already mapped from the SAP role code
    pub role: String,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Field comparison excluding timestamps
    pub fn differs_from(&self, other: &User) -> bool {
        self.first_name != other.first_name
            || self.last_name != other.last_name
            || self.email != other.email
            || self.role != other.role
            || self.status != other.status
    }
}
