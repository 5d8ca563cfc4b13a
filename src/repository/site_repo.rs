// ==========================================
// SAP Meter Exchange - Site repository
// ==========================================
// Manages the sites table. Sites are never deactivated by the feed,
// so the trait has no status operations beyond full update.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::site::Site;
use crate::domain::types::RecordStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// SiteRepository trait
// ==========================================
#[async_trait]
pub trait SiteRepository: Send + Sync {
    async fn find_by_code(&self, site_code: &str) -> RepositoryResult<Option<Site>>;

    async fn insert(&self, site: &Site) -> RepositoryResult<()>;

    async fn update(&self, site: &Site) -> RepositoryResult<()>;
}

// ==========================================
// SQLite implementation
// ==========================================
pub struct SqliteSiteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSiteRepository {
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

    fn row_to_site(row: &Row<'_>) -> rusqlite::Result<Site> {
        Ok(Site {
            site_code: row.get(0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            city: row.get(3)?,
            postal_code: row.get(4)?,
            status: row
                .get::<_, String>(5)
                .map(|s| RecordStatus::parse(&s).unwrap_or(RecordStatus::Inactive))?,
            created_at: parse_ts(row.get::<_, String>(6)?),
            updated_at: parse_ts(row.get::<_, String>(7)?),
        })
    }
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl SiteRepository for SqliteSiteRepository {
    async fn find_by_code(&self, site_code: &str) -> RepositoryResult<Option<Site>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT site_code, name, address, city, postal_code, status,
                    created_at, updated_at
             FROM sites WHERE site_code = ?1",
        )?;

        let result = stmt.query_row(params![site_code], Self::row_to_site);
        match result {
            Ok(site) => Ok(Some(site)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert(&self, site: &Site) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO sites (site_code, name, address, city, postal_code, status,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                site.site_code,
                site.name,
                site.address,
                site.city,
                site.postal_code,
                site.status.as_str(),
                site.created_at.to_rfc3339(),
                site.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn update(&self, site: &Site) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE sites SET name = ?2, address = ?3, city = ?4, postal_code = ?5,
                 status = ?6, updated_at = ?7
             WHERE site_code = ?1",
            params![
                site.site_code,
                site.name,
                site.address,
                site.city,
                site.postal_code,
                site.status.as_str(),
                site.updated_at.to_rfc3339(),
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "site".to_string(),
                key: site.site_code.clone(),
            });
        }
        Ok(())
    }
}
