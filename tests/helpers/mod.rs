// ==========================================
// Integration test harness
// ==========================================
// A temp exchange tree plus a file-backed store, wired together the
// way the CLI wires them in production.
// ==========================================

#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use sap_meter_exchange::repository::{
    SqliteMeterRepository, SqliteReadingRepository, SqliteUserRepository,
};
use sap_meter_exchange::{
    db, logging, EntityKind, ExchangeConfig, ExportPipeline, ImportPipeline, Meter, RecordStatus,
    SourceTier,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct ExchangeHarness {
    pub base: TempDir,
}

impl ExchangeHarness {
    pub fn new() -> Self {
        logging::init_test();
        let base = TempDir::new().unwrap();

        let harness = Self { base };
        let conn = db::open_sqlite_connection(&harness.db_path()).unwrap();
        db::init_schema(&conn).unwrap();
        harness
    }

    pub fn db_path(&self) -> String {
        self.base
            .path()
            .join("exchange.db")
            .to_string_lossy()
            .to_string()
    }

    /// Default configuration rooted in the temp tree
    pub fn config(&self) -> ExchangeConfig {
        let mut config = ExchangeConfig::default();
        config.database_path = self.db_path();
        config.import.base_path = self.base.path().to_path_buf();
        config.lock.lock_dir = self.base.path().join("locks");
        config.export.export_path = self.base.path().join("UPLOAD");
        config.export.archive_path = self.base.path().join("UPLOAD").join("ARCHIVE");
        config
    }

    pub fn feed_dir(&self, tier: SourceTier, entity: EntityKind) -> PathBuf {
        let tier_dir = match tier {
            SourceTier::Staging => "SEP_DOWNLOAD",
            SourceTier::Production => "DOWNLOAD",
        };
        self.base.path().join(tier_dir).join(entity.list_dir_name())
    }

    pub fn archive_dir(&self, entity: EntityKind) -> PathBuf {
        self.base
            .path()
            .join("DOWNLOAD")
            .join(format!("{}_OLD", entity.list_dir_name()))
    }

    pub fn write_feed(&self, tier: SourceTier, entity: EntityKind, name: &str, content: &str) {
        self.write_feed_bytes(tier, entity, name, content.as_bytes());
    }

    pub fn write_feed_bytes(&self, tier: SourceTier, entity: EntityKind, name: &str, bytes: &[u8]) {
        let dir = self.feed_dir(tier, entity);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), bytes).unwrap();
    }

    pub fn import_pipeline(&self) -> ImportPipeline {
        self.import_pipeline_with(self.config())
    }

    pub fn import_pipeline_with(&self, config: ExchangeConfig) -> ImportPipeline {
        ImportPipeline::open(config).unwrap()
    }

    pub fn export_pipeline_with(&self, config: ExchangeConfig) -> ExportPipeline {
        ExportPipeline::open(config).unwrap()
    }

    pub fn meters(&self) -> SqliteMeterRepository {
        SqliteMeterRepository::new(&self.db_path()).unwrap()
    }

    pub fn users(&self) -> SqliteUserRepository {
        SqliteUserRepository::new(&self.db_path()).unwrap()
    }

    pub fn readings(&self) -> SqliteReadingRepository {
        SqliteReadingRepository::new(&self.db_path()).unwrap()
    }
}

/// One meter feed line in the positional SAP layout:
/// meter_code;serial_number;site_code;customer_name;contract_number;
/// measuring_point;business_entity;company;status;ro_date
pub fn meter_feed_line(code: &str, customer: &str, status: &str) -> String {
    format!("{code};SN-1;S1;{customer};C-100;7;BE1;CO1;{status};20260101")
}

/// A fully export-eligible meter record for direct store seeding
pub fn active_meter(code: &str, business_entity: &str, company: &str) -> Meter {
    let now = Utc::now();
    Meter {
        meter_code: code.to_string(),
        serial_number: Some("SN-1".to_string()),
        site_code: Some("S1".to_string()),
        customer_name: Some("Acme Energy".to_string()),
        contract_number: Some("C-100".to_string()),
        measuring_point: 7,
        business_entity: Some(business_entity.to_string()),
        company: Some(company.to_string()),
        status: RecordStatus::Active,
        ro_date: NaiveDate::from_ymd_opt(2026, 1, 15),
        last_seen_at: Some(now),
        created_at: now,
        updated_at: now,
    }
}
