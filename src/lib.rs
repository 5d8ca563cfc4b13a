// ==========================================
// SAP Meter Exchange - Core Library
// ==========================================
// Batch integration between the metering administration store
// and the SAP ERP: master-data CSV imports (meters / sites / users)
// and nightly meter-reading CSV exports for billing.
// ==========================================

// ==========================================
// Module declarations
// ==========================================

// Domain layer - entities and types
pub mod domain;

// Repository layer - data access
pub mod repository;

// Exchange layer - import/export pipeline
pub mod exchange;

// Configuration layer
pub mod config;

// Database infrastructure (connection init / unified PRAGMA)
pub mod db;

// Logging
pub mod logging;

// ==========================================
// Re-exports of core types
// ==========================================

// Domain types
pub use domain::types::{EntityKind, RecordStatus, SourceTier};

// Domain entities
pub use domain::{ExportCandidate, ImportJobRun, JobReport, Meter, MeterReading, Site, User};

// Configuration
pub use config::{ExchangeConfig, ExportRulesConfig, MappingTables};

// Pipeline
pub use exchange::{
    Archiver, CsvParser, DirectoryResolver, ExchangeError, ExchangeResult, ExportPipeline,
    ExportValidator, ExportWriter, ImportPipeline, LockManager,
};

// ==========================================
// Constants
// ==========================================

// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Application name
pub const APP_NAME: &str = "SAP Meter Exchange";
