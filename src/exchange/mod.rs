// ==========================================
// SAP Meter Exchange - Exchange layer
// ==========================================
// The batch pipeline itself: lock handling, directory resolution,
// feed parsing, reconciliation, archival and the billing export.
// No UI or transport concerns; the scheduler invoking these jobs is
// an external collaborator.
// ==========================================

pub mod archiver;
pub mod dirs;
pub mod error;
pub mod export;
pub mod file_parser;
pub mod jobs;
pub mod lock;
pub mod reconcile;

// Re-export core types
pub use archiver::Archiver;
pub use dirs::DirectoryResolver;
pub use error::{ExchangeError, ExchangeResult, RowError};
pub use export::{ExportValidator, ExportWriter, Rejection};
pub use file_parser::{CsvParser, RawRow};
pub use jobs::{ExportPipeline, ImportPipeline};
pub use lock::{LockGuard, LockManager};
pub use reconcile::{
    EntityReconciler, MeterReconciler, ReconcileSummary, SiteReconciler, UserReconciler,
};
