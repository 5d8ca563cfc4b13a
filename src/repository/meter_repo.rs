// ==========================================
// SAP Meter Exchange - Meter repository
// ==========================================
// Manages the meters table. The reconciler drives create / update /
// deactivate through this trait; the SQLite implementation is the
// only production backend.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::meter::Meter;
use crate::domain::types::RecordStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// MeterRepository trait
// ==========================================
#[async_trait]
pub trait MeterRepository: Send + Sync {
    async fn find_by_code(&self, meter_code: &str) -> RepositoryResult<Option<Meter>>;

    async fn insert(&self, meter: &Meter) -> RepositoryResult<()>;

    /// Full-record update keyed on meter_code
    async fn update(&self, meter: &Meter) -> RepositoryResult<()>;

    /// Codes of all meters currently marked ACTIVE
    async fn list_active_codes(&self) -> RepositoryResult<Vec<String>>;

    async fn set_status(&self, meter_code: &str, status: RecordStatus) -> RepositoryResult<()>;

    /// Cleanup pass: delete meters that are unassigned (no site) and
    /// inactive. Returns the number of deleted rows.
    async fn delete_unassigned_inactive(&self) -> RepositoryResult<usize>;
}

// ==========================================
// SQLite implementation
// ==========================================
pub struct SqliteMeterRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMeterRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn row_to_meter(row: &Row<'_>) -> rusqlite::Result<Meter> {
        Ok(Meter {
            meter_code: row.get(0)?,
            serial_number: row.get(1)?,
            site_code: row.get(2)?,
            customer_name: row.get(3)?,
            contract_number: row.get(4)?,
            measuring_point: row.get(5)?,
            business_entity: row.get(6)?,
            company: row.get(7)?,
            status: row
                .get::<_, String>(8)
                .map(|s| RecordStatus::parse(&s).unwrap_or(RecordStatus::Inactive))?,
            ro_date: row
                .get::<_, Option<String>>(9)?
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            last_seen_at: row
                .get::<_, Option<String>>(10)?
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            created_at: parse_ts(row.get::<_, String>(11)?),
            updated_at: parse_ts(row.get::<_, String>(12)?),
        })
    }
}

const METER_COLUMNS: &str = "meter_code, serial_number, site_code, customer_name, \
     contract_number, measuring_point, business_entity, company, status, ro_date, \
     last_seen_at, created_at, updated_at";

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl MeterRepository for SqliteMeterRepository {
    async fn find_by_code(&self, meter_code: &str) -> RepositoryResult<Option<Meter>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {METER_COLUMNS} FROM meters WHERE meter_code = ?1"
        ))?;

        let result = stmt.query_row(params![meter_code], Self::row_to_meter);
        match result {
            Ok(meter) => Ok(Some(meter)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert(&self, meter: &Meter) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO meters (meter_code, serial_number, site_code, customer_name,
                 contract_number, measuring_point, business_entity, company, status,
                 ro_date, last_seen_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                meter.meter_code,
                meter.serial_number,
                meter.site_code,
                meter.customer_name,
                meter.contract_number,
                meter.measuring_point,
                meter.business_entity,
                meter.company,
                meter.status.as_str(),
                meter.ro_date.map(|d| d.to_string()),
                meter.last_seen_at.map(|dt| dt.to_rfc3339()),
                meter.created_at.to_rfc3339(),
                meter.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn update(&self, meter: &Meter) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE meters SET serial_number = ?2, site_code = ?3, customer_name = ?4,
                 contract_number = ?5, measuring_point = ?6, business_entity = ?7,
                 company = ?8, status = ?9, ro_date = ?10, updated_at = ?11
             WHERE meter_code = ?1",
            params![
                meter.meter_code,
                meter.serial_number,
                meter.site_code,
                meter.customer_name,
                meter.contract_number,
                meter.measuring_point,
                meter.business_entity,
                meter.company,
                meter.status.as_str(),
                meter.ro_date.map(|d| d.to_string()),
                meter.updated_at.to_rfc3339(),
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "meter".to_string(),
                key: meter.meter_code.clone(),
            });
        }
        Ok(())
    }

    async fn list_active_codes(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT meter_code FROM meters WHERE status = 'ACTIVE' ORDER BY meter_code")?;
        let codes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(codes)
    }

    async fn set_status(&self, meter_code: &str, status: RecordStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE meters SET status = ?2, updated_at = ?3 WHERE meter_code = ?1",
            params![meter_code, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn delete_unassigned_inactive(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM meters
             WHERE status = 'INACTIVE'
               AND (site_code IS NULL OR TRIM(site_code) = '')",
            [],
        )?;
        Ok(deleted)
    }
}
