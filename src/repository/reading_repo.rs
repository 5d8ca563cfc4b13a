// ==========================================
// SAP Meter Exchange - Reading repository
// ==========================================
// Read side of the export: builds ExportCandidate projections from
// the latest reading per meter as of a logical cutoff. The cutoff
// bound lives in the SQL so the run reads a consistent snapshot no
// matter when it executes.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::export::ExportCandidate;
use crate::domain::reading::MeterReading;
use crate::domain::types::RecordStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ReadingRepository trait
// ==========================================
#[async_trait]
pub trait ReadingRepository: Send + Sync {
    /// Latest reading per meter with recorded_at <= cutoff, joined
    /// with the owning meter. Ties on recorded_at resolve to the
    /// last-inserted row, so the result is always one row per meter.
    /// Ordered by meter_code for deterministic export output.
    async fn candidates_as_of(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<ExportCandidate>>;

    /// Used by the polling layer and by tests to seed readings
    async fn insert_reading(&self, reading: &MeterReading) -> RepositoryResult<()>;
}

// ==========================================
// SQLite implementation
// ==========================================
pub struct SqliteReadingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReadingRepository {
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
}

#[async_trait]
impl ReadingRepository for SqliteReadingRepository {
    async fn candidates_as_of(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<ExportCandidate>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT m.meter_code, m.customer_name, m.contract_number, m.measuring_point,
                    m.business_entity, m.company, m.status, m.ro_date, m.last_seen_at,
                    r.value, r.recorded_at
             FROM meters m
             JOIN meter_readings r ON r.meter_code = m.meter_code
             WHERE r.id = (
                 SELECT r2.id FROM meter_readings r2
                 WHERE r2.meter_code = m.meter_code AND r2.recorded_at <= ?1
                 ORDER BY r2.recorded_at DESC, r2.id DESC
                 LIMIT 1
             )
             ORDER BY m.meter_code",
        )?;

        let cutoff_str = cutoff.to_rfc3339();
        let candidates = stmt
            .query_map(params![cutoff_str], |row| {
                Ok(ExportCandidate {
                    meter_code: row.get(0)?,
                    customer_name: row.get(1)?,
                    contract_number: row.get(2)?,
                    measuring_point: row.get(3)?,
                    business_entity: row.get(4)?,
                    company: row.get(5)?,
                    status: row
                        .get::<_, String>(6)
                        .map(|s| RecordStatus::parse(&s).unwrap_or(RecordStatus::Inactive))?,
                    ro_date: row
                        .get::<_, Option<String>>(7)?
                        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                    last_seen_at: row
                        .get::<_, Option<String>>(8)?
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                    reading_value: row.get(9)?,
                    reading_recorded_at: row
                        .get::<_, String>(10)
                        .map(|s| {
                            DateTime::parse_from_rfc3339(&s)
                                .map(|dt| dt.with_timezone(&Utc))
                                .unwrap_or_else(|_| Utc::now())
                        })?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(candidates)
    }

    async fn insert_reading(&self, reading: &MeterReading) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO meter_readings (meter_code, value, recorded_at)
             VALUES (?1, ?2, ?3)",
            params![
                reading.meter_code,
                reading.value,
                reading.recorded_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::domain::meter::Meter;
    use crate::repository::meter_repo::{MeterRepository, SqliteMeterRepository};
    use chrono::TimeZone;

    fn shared_conn() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        db::configure_sqlite_connection(&conn).unwrap();
        db::init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn meter(code: &str) -> Meter {
        Meter {
            meter_code: code.to_string(),
            serial_number: None,
            site_code: Some("S1".to_string()),
            customer_name: Some("Acme".to_string()),
            contract_number: Some("C-1".to_string()),
            measuring_point: 7,
            business_entity: Some("BE1".to_string()),
            company: Some("CO1".to_string()),
            status: RecordStatus::Active,
            ro_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            last_seen_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cutoff_excludes_later_readings() {
        let conn = shared_conn();
        let meters = SqliteMeterRepository::from_connection(conn.clone());
        let readings = SqliteReadingRepository::from_connection(conn);

        meters.insert(&meter("MTR-1")).await.unwrap();

        let before = Utc.with_ymd_and_hms(2026, 8, 25, 18, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 8, 26, 6, 0, 0).unwrap();
        let cutoff = Utc.with_ymd_and_hms(2026, 8, 26, 0, 0, 0).unwrap();

        readings
            .insert_reading(&MeterReading {
                meter_code: "MTR-1".to_string(),
                value: 10.0,
                recorded_at: before,
            })
            .await
            .unwrap();
        readings
            .insert_reading(&MeterReading {
                meter_code: "MTR-1".to_string(),
                value: 99.0,
                recorded_at: after,
            })
            .await
            .unwrap();

        let candidates = readings.candidates_as_of(cutoff).await.unwrap();
        assert_eq!(candidates.len(), 1);
        // The post-cutoff reading must not surface
        assert_eq!(candidates[0].reading_value, 10.0);
        assert_eq!(candidates[0].reading_recorded_at, before);
    }

    #[tokio::test]
    async fn test_equal_timestamps_yield_one_candidate() {
        let conn = shared_conn();
        let meters = SqliteMeterRepository::from_connection(conn.clone());
        let readings = SqliteReadingRepository::from_connection(conn);

        meters.insert(&meter("MTR-1")).await.unwrap();

        let at = Utc.with_ymd_and_hms(2026, 8, 25, 18, 0, 0).unwrap();
        for value in [10.0, 12.0] {
            readings
                .insert_reading(&MeterReading {
                    meter_code: "MTR-1".to_string(),
                    value,
                    recorded_at: at,
                })
                .await
                .unwrap();
        }

        // The tie resolves to the last-inserted reading, never to
        // duplicate rows for one meter
        let candidates = readings.candidates_as_of(Utc::now()).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reading_value, 12.0);
    }

    #[tokio::test]
    async fn test_meter_without_readings_is_not_a_candidate() {
        let conn = shared_conn();
        let meters = SqliteMeterRepository::from_connection(conn.clone());
        let readings = SqliteReadingRepository::from_connection(conn);

        meters.insert(&meter("MTR-SILENT")).await.unwrap();
        let candidates = readings.candidates_as_of(Utc::now()).await.unwrap();
        assert!(candidates.is_empty());
    }
}
