// ==========================================
// SAP Meter Exchange - Domain Layer
// ==========================================
// Entities mirror the administration store tables plus the
// transient export projection and the job audit record.
// ==========================================

pub mod export;
pub mod job_run;
pub mod meter;
pub mod reading;
pub mod site;
pub mod types;
pub mod user;

// Re-export core entities
pub use export::ExportCandidate;
pub use job_run::{ImportJobRun, JobReport};
pub use meter::Meter;
pub use reading::MeterReading;
pub use site::Site;
pub use user::User;
