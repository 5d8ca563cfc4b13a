// ==========================================
// SAP Meter Exchange - Domain type definitions
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Entity kind
// ==========================================
// One kind per master-data feed. Directory names, job keys and the
// feed column schemas hang off this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Meter,
    Site,
    User,
}

impl EntityKind {
    /// Directory stem under DOWNLOAD / SEP_DOWNLOAD
    pub fn list_dir_name(&self) -> &'static str {
        match self {
            EntityKind::Meter => "METER_LIST",
            EntityKind::Site => "SITE_LIST",
            EntityKind::User => "USER_LIST",
        }
    }

    /// Lock key for the import job of this entity
    pub fn job_key(&self) -> &'static str {
        match self {
            EntityKind::Meter => "importmetermaster",
            EntityKind::Site => "importsitemaster",
            EntityKind::User => "importusermaster",
        }
    }

    /// Feed column schema (positional order in header-less files)
    pub fn feed_schema(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Meter => &[
                "meter_code",
                "serial_number",
                "site_code",
                "customer_name",
                "contract_number",
                "measuring_point",
                "business_entity",
                "company",
                "status",
                "ro_date",
            ],
            EntityKind::Site => &[
                "site_code",
                "name",
                "address",
                "city",
                "postal_code",
                "status",
            ],
            EntityKind::User => &[
                "username",
                "first_name",
                "last_name",
                "email",
                "role",
                "status",
            ],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Meter => write!(f, "METER"),
            EntityKind::Site => write!(f, "SITE"),
            EntityKind::User => write!(f, "USER"),
        }
    }
}

// ==========================================
// Record status
// ==========================================
// Serialized format: SCREAMING_SNAKE_CASE (matches the database)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Active,
    Inactive,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "ACTIVE",
            RecordStatus::Inactive => "INACTIVE",
        }
    }

    /// Parse the stored representation
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "ACTIVE" => Some(RecordStatus::Active),
            "INACTIVE" => Some(RecordStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// Source tier
// ==========================================
// Two parallel exchange trees: SEP_DOWNLOAD is the pre-production
// (staging) tier, DOWNLOAD is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceTier {
    Staging,
    Production,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Staging => "STAGING",
            SourceTier::Production => "PRODUCTION",
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_status_roundtrip() {
        assert_eq!(RecordStatus::parse("active"), Some(RecordStatus::Active));
        assert_eq!(
            RecordStatus::parse(" INACTIVE "),
            Some(RecordStatus::Inactive)
        );
        assert_eq!(RecordStatus::parse("gone"), None);
        assert_eq!(RecordStatus::Active.to_string(), "ACTIVE");
    }

    #[test]
    fn test_entity_kind_names() {
        assert_eq!(EntityKind::Meter.list_dir_name(), "METER_LIST");
        assert_eq!(EntityKind::Meter.job_key(), "importmetermaster");
        assert_eq!(EntityKind::User.feed_schema()[0], "username");
    }
}
