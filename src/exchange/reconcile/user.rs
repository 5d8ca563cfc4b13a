// ==========================================
// SAP Meter Exchange - User reconciler
// ==========================================
// Feed columns: username, first_name, last_name, email, role,
// status. Required: username, role (mapped), status (mapped). The
// SAP feed is the HR source of truth, so users absent from the feed
// are deactivated in finalize().
// ==========================================

use crate::config::MappingTables;
use crate::domain::types::{EntityKind, RecordStatus};
use crate::domain::user::User;
use crate::exchange::error::{ExchangeResult, RowError};
use crate::exchange::file_parser::RawRow;
use crate::exchange::reconcile::{EntityReconciler, ReconcileSummary};
use crate::repository::user_repo::UserRepository;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// UserReconciler
// ==========================================
pub struct UserReconciler<R: ?Sized>
where
    R: UserRepository,
{
    repo: Arc<R>,
    mappings: MappingTables,
}

impl<R: ?Sized> UserReconciler<R>
where
    R: UserRepository,
{
    pub fn new(repo: Arc<R>, mappings: MappingTables) -> Self {
        Self { repo, mappings }
    }

    fn row_to_user(&self, file: &str, row: &RawRow) -> Result<User, RowError> {
        let username = row
            .get("username")
            .ok_or_else(|| RowError::new(file, row.number, "username missing"))?
            .to_string();

        let role_raw = row
            .get("role")
            .ok_or_else(|| RowError::new(file, row.number, "role missing"))?;
        let role = self.mappings.map_role(role_raw).ok_or_else(|| {
            RowError::new(file, row.number, format!("unmapped role code: {role_raw}"))
        })?;

        let status_raw = row
            .get("status")
            .ok_or_else(|| RowError::new(file, row.number, "status missing"))?;
        let status = self.mappings.map_status(status_raw).ok_or_else(|| {
            RowError::new(file, row.number, format!("unmapped status code: {status_raw}"))
        })?;

        let now = Utc::now();
        Ok(User {
            username,
            first_name: row.get("first_name").map(str::to_string),
            last_name: row.get("last_name").map(str::to_string),
            email: row.get("email").map(str::to_string),
            role,
            status,
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl<R: ?Sized> EntityReconciler for UserReconciler<R>
where
    R: UserRepository,
{
    fn entity(&self) -> EntityKind {
        EntityKind::User
    }

    async fn reconcile_file(
        &self,
        file_name: &str,
        rows: &[RawRow],
        seen: &mut HashSet<String>,
    ) -> ExchangeResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        for row in rows {
            if let Some(name) = row.get("username") {
                seen.insert(name.to_string());
            }

            let candidate = match self.row_to_user(file_name, row) {
                Ok(u) => u,
                Err(e) => {
                    summary.errors.push(e);
                    continue;
                }
            };

            match self.repo.find_by_username(&candidate.username).await? {
                None => {
                    self.repo.insert(&candidate).await?;
                    summary.created += 1;
                    debug!(username = %candidate.username, "user created");
                }
                Some(existing) => {
                    let mut merged = candidate;
                    merged.created_at = existing.created_at;
                    if existing.differs_from(&merged) {
                        merged.updated_at = Utc::now();
                        self.repo.update(&merged).await?;
                        summary.updated += 1;
                        debug!(username = %merged.username, "user updated");
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn finalize(&self, seen: &HashSet<String>) -> ExchangeResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        for username in self.repo.list_active_usernames().await? {
            if !seen.contains(&username) {
                self.repo
                    .set_status(&username, RecordStatus::Inactive)
                    .await?;
                summary.deactivated += 1;
                info!(username = %username, "user deactivated (absent from feed)");
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::repository::user_repo::SqliteUserRepository;
    use rusqlite::Connection;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn test_repo() -> Arc<SqliteUserRepository> {
        let conn = Connection::open_in_memory().unwrap();
        db::configure_sqlite_connection(&conn).unwrap();
        db::init_schema(&conn).unwrap();
        Arc::new(SqliteUserRepository::from_connection(Arc::new(Mutex::new(
            conn,
        ))))
    }

    fn user_row(number: usize, name: &str, role: &str, status: &str) -> RawRow {
        let values: HashMap<String, String> = [
            ("username", name),
            ("first_name", "Jo"),
            ("last_name", "Doe"),
            ("email", "jo@example.org"),
            ("role", role),
            ("status", status),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        RawRow { number, values }
    }

    #[tokio::test]
    async fn test_role_mapping_required() {
        let repo = test_repo();
        let reconciler = UserReconciler::new(repo.clone(), MappingTables::default());
        let mut seen = HashSet::new();

        let rows = vec![
            user_row(1, "u1", "ZADM", "A"),
            user_row(2, "u2", "Z_NOPE", "A"),
        ];
        let summary = reconciler
            .reconcile_file("USER_LIST.csv", &rows, &mut seen)
            .await
            .unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].reason.contains("unmapped role"));

        let u1 = repo.find_by_username("u1").await.unwrap().unwrap();
        assert_eq!(u1.role, "admin");
    }

    #[tokio::test]
    async fn test_absent_users_deactivated() {
        let repo = test_repo();
        let reconciler = UserReconciler::new(repo.clone(), MappingTables::default());

        let mut seen = HashSet::new();
        let rows = vec![
            user_row(1, "u1", "ZUSR", "A"),
            user_row(2, "u2", "ZUSR", "A"),
        ];
        reconciler
            .reconcile_file("USER_LIST.csv", &rows, &mut seen)
            .await
            .unwrap();

        let mut seen = HashSet::new();
        let rows = vec![user_row(1, "u1", "ZUSR", "A")];
        reconciler
            .reconcile_file("USER_LIST.csv", &rows, &mut seen)
            .await
            .unwrap();
        let summary = reconciler.finalize(&seen).await.unwrap();
        assert_eq!(summary.deactivated, 1);

        let u2 = repo.find_by_username("u2").await.unwrap().unwrap();
        assert_eq!(u2.status, RecordStatus::Inactive);
    }
}
