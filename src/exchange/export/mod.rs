// ==========================================
// SAP Meter Exchange - Export layer
// ==========================================
// Validation chain + billing file writer. Eligibility is decided
// entirely in the validator; the writer only formats and writes.
// ==========================================

pub mod validator;
pub mod writer;

pub use validator::{ExportValidator, Rejection};
pub use writer::ExportWriter;
