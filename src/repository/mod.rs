// ==========================================
// SAP Meter Exchange - Repository layer
// ==========================================
// Responsibility: data access only, no pipeline logic.
// Constraint: parameterized SQL everywhere.
// ==========================================

pub mod error;
pub mod job_run_repo;
pub mod meter_repo;
pub mod reading_repo;
pub mod site_repo;
pub mod user_repo;

// Re-export core repositories
pub use error::{RepositoryError, RepositoryResult};
pub use job_run_repo::{JobRunRepository, SqliteJobRunRepository};
pub use meter_repo::{MeterRepository, SqliteMeterRepository};
pub use reading_repo::{ReadingRepository, SqliteReadingRepository};
pub use site_repo::{SiteRepository, SqliteSiteRepository};
pub use user_repo::{SqliteUserRepository, UserRepository};
