// ==========================================
// SAP Meter Exchange - Configuration layer
// ==========================================

pub mod settings;

pub use settings::{
    ExchangeConfig, ExportConfig, ExportRulesConfig, ImportConfig, LockConfig, MappingTables,
    NotificationConfig,
};
