// ==========================================
// SAP Meter Exchange - Configuration
// ==========================================
// One immutable configuration struct assembled at process start and
// injected into each component constructor. No ambient lookups from
// inside pipeline logic.
// Storage: JSON file; every section has serde defaults so a partial
// file (or none at all, for tests) is valid.
// ==========================================

use crate::domain::types::RecordStatus;
use anyhow::Context;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ==========================================
// ExchangeConfig - top level
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// SQLite database file of the administration store
    pub database_path: String,
    pub import: ImportConfig,
    pub export: ExportConfig,
    pub lock: LockConfig,
    pub mappings: MappingTables,
    pub notification: NotificationConfig,
    /// Days to keep import_job_runs audit rows
    pub run_retention_days: i64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            database_path: "exchange.db".to_string(),
            import: ImportConfig::default(),
            export: ExportConfig::default(),
            lock: LockConfig::default(),
            mappings: MappingTables::default(),
            notification: NotificationConfig::default(),
            run_retention_days: 90,
        }
    }
}

impl ExchangeConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: ExchangeConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }
}

// ==========================================
// ImportConfig
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Base of the SAP exchange tree ({base}/DOWNLOAD, {base}/SEP_DOWNLOAD)
    pub base_path: PathBuf,
    /// Scan the staging tier (SEP_DOWNLOAD) before production
    pub staging_first: bool,
    /// Glob for feed files; extension matching is case-insensitive
    pub file_pattern: String,
    /// Feed field delimiter
    pub delimiter: char,
    pub meters_enabled: bool,
    pub sites_enabled: bool,
    pub users_enabled: bool,
    /// Delete meters that are both unassigned and inactive after a
    /// meter reconciliation pass
    pub cleanup_unassigned_inactive: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("exchange"),
            staging_first: true,
            file_pattern: "*.csv".to_string(),
            delimiter: ';',
            meters_enabled: true,
            sites_enabled: true,
            users_enabled: true,
            cleanup_unassigned_inactive: false,
        }
    }
}

// ==========================================
// ExportConfig
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    /// Directory the billing files are written to
    pub export_path: PathBuf,
    /// Sibling directory files move to once SAP has consumed them
    pub archive_path: PathBuf,
    /// Filename template; placeholders: {business_entity} {company}
    /// {day} {month} {year}
    pub filename_template: String,
    /// Output field delimiter (hard external contract: comma)
    pub delimiter: char,
    /// Daily cutoff separating readings per export day
    pub cutoff_time: NaiveTime,
    pub rules: ExportRulesConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            export_path: PathBuf::from("exchange/UPLOAD"),
            archive_path: PathBuf::from("exchange/UPLOAD/ARCHIVE"),
            filename_template: "{business_entity}_{company}_{day}_{month}_{year}.csv".to_string(),
            delimiter: ',',
            cutoff_time: NaiveTime::from_hms_opt(0, 0, 0).expect("valid default cutoff"),
            rules: ExportRulesConfig::default(),
        }
    }
}

// ==========================================
// ExportRulesConfig - validation rule chain
// ==========================================
// Every rule carries its own enable flag so operators can toggle a
// single rule without touching the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportRulesConfig {
    pub require_active: bool,
    pub require_ro_date: bool,
    pub require_customer_name: bool,
    pub require_contract_number: bool,
    pub require_measuring_point: bool,
    pub check_min_reading_value: bool,
    pub min_reading_value: f64,
    pub check_max_offline_days: bool,
    pub max_offline_days: i64,
}

impl Default for ExportRulesConfig {
    fn default() -> Self {
        Self {
            require_active: true,
            require_ro_date: true,
            require_customer_name: true,
            require_contract_number: true,
            require_measuring_point: true,
            check_min_reading_value: true,
            min_reading_value: 0.0,
            check_max_offline_days: true,
            max_offline_days: 30,
        }
    }
}

// ==========================================
// LockConfig
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Directory holding one marker file per job key
    pub lock_dir: PathBuf,
    /// A lock older than this is treated as abandoned by a crashed
    /// run and forcibly released on the next acquire
    pub stale_after_minutes: i64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lock_dir: PathBuf::from("exchange/locks"),
            stale_after_minutes: 120,
        }
    }
}

// ==========================================
// NotificationConfig
// ==========================================
// Delivery itself belongs to the invoking layer; the pipeline only
// carries the surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub error_recipients: Vec<String>,
    pub daily_summary: bool,
}

// ==========================================
// MappingTables - feed vocabulary lookups
// ==========================================
// Explicit configuration-supplied lookups passed into the
// reconcilers. Keys are matched case-insensitively on the trimmed
// feed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingTables {
    /// SAP role code -> internal role name
    pub user_roles: HashMap<String, String>,
    /// SAP status code -> internal status (ACTIVE / INACTIVE)
    pub status_codes: HashMap<String, String>,
}

impl Default for MappingTables {
    fn default() -> Self {
        let mut user_roles = HashMap::new();
        user_roles.insert("ZADM".to_string(), "admin".to_string());
        user_roles.insert("ZUSR".to_string(), "user".to_string());
        user_roles.insert("ZRDO".to_string(), "viewer".to_string());

        let mut status_codes = HashMap::new();
        status_codes.insert("A".to_string(), "ACTIVE".to_string());
        status_codes.insert("I".to_string(), "INACTIVE".to_string());
        status_codes.insert("01".to_string(), "ACTIVE".to_string());
        status_codes.insert("02".to_string(), "INACTIVE".to_string());
        status_codes.insert("ACTIVE".to_string(), "ACTIVE".to_string());
        status_codes.insert("INACTIVE".to_string(), "INACTIVE".to_string());

        Self {
            user_roles,
            status_codes,
        }
    }
}

impl MappingTables {
    /// Map a SAP role code to the internal role, None when unmapped
    pub fn map_role(&self, raw: &str) -> Option<String> {
        let key = raw.trim().to_uppercase();
        self.user_roles.get(&key).cloned()
    }

    /// Map a SAP status code to the internal status, None when unmapped
    pub fn map_status(&self, raw: &str) -> Option<RecordStatus> {
        let key = raw.trim().to_uppercase();
        self.status_codes
            .get(&key)
            .and_then(|v| RecordStatus::parse(v))
    }
}
