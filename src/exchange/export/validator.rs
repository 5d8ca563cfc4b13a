// ==========================================
// SAP Meter Exchange - Export validator
// ==========================================
// A chain of named predicates; ALL enabled rules must pass for a
// candidate to reach the billing file. Each rule has its own enable
// flag so a single rule can be toggled without touching the others.
// A rejection is an exclusion reason for the audit log, not an
// error, and never surfaces in the SAP file.
// ==========================================

use crate::config::ExportRulesConfig;
use crate::domain::export::ExportCandidate;
use crate::domain::types::RecordStatus;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Exclusion record kept per rejected candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub meter_code: String,
    pub rule: &'static str,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.meter_code, self.rule)
    }
}

// ==========================================
// ExportValidator
// ==========================================
pub struct ExportValidator {
    rules: ExportRulesConfig,
}

impl ExportValidator {
    pub fn new(rules: ExportRulesConfig) -> Self {
        Self { rules }
    }

    /// Name of the first enabled rule the candidate fails, or None
    /// when it is eligible.
    pub fn check(&self, candidate: &ExportCandidate, cutoff: DateTime<Utc>) -> Option<&'static str> {
        let r = &self.rules;

        if r.require_active && candidate.status != RecordStatus::Active {
            return Some("status_active");
        }

        if r.require_ro_date && candidate.ro_date.is_none() {
            return Some("ro_date_present");
        }

        if r.require_customer_name && is_blank(candidate.customer_name.as_deref()) {
            return Some("customer_name_present");
        }

        if r.require_contract_number && is_blank(candidate.contract_number.as_deref()) {
            return Some("contract_number_present");
        }

        if r.require_measuring_point && candidate.measuring_point == 0 {
            return Some("measuring_point_nonzero");
        }

        if r.check_min_reading_value && candidate.reading_value < r.min_reading_value {
            return Some("min_reading_value");
        }

        if r.check_max_offline_days {
            let within_window = candidate
                .last_seen_at
                .map(|seen| cutoff - seen <= Duration::days(r.max_offline_days))
                .unwrap_or(false);
            if !within_window {
                return Some("max_offline_days");
            }
        }

        None
    }

    /// Split candidates into eligible and rejected, preserving input
    /// order for deterministic output.
    pub fn partition(
        &self,
        candidates: Vec<ExportCandidate>,
        cutoff: DateTime<Utc>,
    ) -> (Vec<ExportCandidate>, Vec<Rejection>) {
        let mut eligible = Vec::new();
        let mut rejected = Vec::new();

        for candidate in candidates {
            match self.check(&candidate, cutoff) {
                None => eligible.push(candidate),
                Some(rule) => {
                    debug!(meter_code = %candidate.meter_code, rule, "export candidate excluded");
                    rejected.push(Rejection {
                        meter_code: candidate.meter_code,
                        rule,
                    });
                }
            }
        }

        (eligible, rejected)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
