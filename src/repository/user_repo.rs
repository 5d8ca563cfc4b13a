// ==========================================
// SAP Meter Exchange - User repository
// ==========================================
// Manages the users table. The SAP feed is the HR source of truth,
// so the reconciler can deactivate users missing from the feed.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::RecordStatus;
use crate::domain::user::User;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// UserRepository trait
// ==========================================
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;

    async fn insert(&self, user: &User) -> RepositoryResult<()>;

    async fn update(&self, user: &User) -> RepositoryResult<()>;

    /// Usernames of all users currently marked ACTIVE
    async fn list_active_usernames(&self) -> RepositoryResult<Vec<String>>;

    async fn set_status(&self, username: &str, status: RecordStatus) -> RepositoryResult<()>;
}

// ==========================================
// SQLite implementation
// ==========================================
pub struct SqliteUserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserRepository {
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

    fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            username: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            role: row.get(4)?,
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
impl UserRepository for SqliteUserRepository {
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT username, first_name, last_name, email, role, status,
                    created_at, updated_at
             FROM users WHERE username = ?1",
        )?;

        let result = stmt.query_row(params![username], Self::row_to_user);
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert(&self, user: &User) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO users (username, first_name, last_name, email, role, status,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.username,
                user.first_name,
                user.last_name,
                user.email,
                user.role,
                user.status.as_str(),
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn update(&self, user: &User) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE users SET first_name = ?2, last_name = ?3, email = ?4, role = ?5,
                 status = ?6, updated_at = ?7
             WHERE username = ?1",
            params![
                user.username,
                user.first_name,
                user.last_name,
                user.email,
                user.role,
                user.status.as_str(),
                user.updated_at.to_rfc3339(),
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "user".to_string(),
                key: user.username.clone(),
            });
        }
        Ok(())
    }

    async fn list_active_usernames(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT username FROM users WHERE status = 'ACTIVE' ORDER BY username")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    async fn set_status(&self, username: &str, status: RecordStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE users SET status = ?2, updated_at = ?3 WHERE username = ?1",
            params![username, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_repo() -> SqliteUserRepository {
        let conn = Connection::open_in_memory().unwrap();
        db::configure_sqlite_connection(&conn).unwrap();
        db::init_schema(&conn).unwrap();
        SqliteUserRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn user(name: &str, role: &str, status: RecordStatus) -> User {
        User {
            username: name.to_string(),
            first_name: None,
            last_name: None,
            email: Some(format!("{name}@example.org")),
            role: role.to_string(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_update_status() {
        let repo = test_repo();
        repo.insert(&user("u1", "user", RecordStatus::Active))
            .await
            .unwrap();
        repo.insert(&user("u2", "admin", RecordStatus::Active))
            .await
            .unwrap();

        assert_eq!(
            repo.list_active_usernames().await.unwrap(),
            vec!["u1", "u2"]
        );

        repo.set_status("u2", RecordStatus::Inactive).await.unwrap();
        assert_eq!(repo.list_active_usernames().await.unwrap(), vec!["u1"]);

        let found = repo.find_by_username("u2").await.unwrap().unwrap();
        assert_eq!(found.status, RecordStatus::Inactive);
        assert_eq!(found.role, "admin");
    }
}
