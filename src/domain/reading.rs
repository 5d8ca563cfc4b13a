// ==========================================
// SAP Meter Exchange - Meter reading
// ==========================================
// Produced by the (external) polling layer; the exchange only reads
// this table for the nightly export.
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted meter reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub meter_code: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}
