// ==========================================
// SAP Meter Exchange - Export writer
// ==========================================
// Formats eligible candidates into the billing CSV layout and writes
// one file per (business entity, company) group. The layout is a
// hard external contract with the SAP ingester:
// - no header row
// - delimiter (comma), NO enclosure, backslash escape
// - fixed column order:
//     meter_code, measuring_point, customer_name, contract_number,
//     reading value (2 decimals), reading date (YYYYMMDD),
//     ro_date (YYYYMMDD)
// Eligibility is already decided by the validator; nothing here
// filters candidates.
// ==========================================

use crate::config::ExportConfig;
use crate::domain::export::ExportCandidate;
use crate::exchange::error::ExchangeResult;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// ==========================================
// ExportWriter
// ==========================================
pub struct ExportWriter {
    export_dir: PathBuf,
    template: String,
    delimiter: char,
}

impl ExportWriter {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            export_dir: config.export_path.clone(),
            template: config.filename_template.clone(),
            delimiter: config.delimiter,
        }
    }

    /// Write one file per (business entity, company) group for the
    /// given cutoff day. Returns the written paths in group order.
    /// Deterministic: groups are ordered (BTreeMap) and rows sorted
    /// by meter code, so identical input yields identical bytes.
    pub fn write(
        &self,
        candidates: &[ExportCandidate],
        day: NaiveDate,
    ) -> ExchangeResult<Vec<PathBuf>> {
        fs::create_dir_all(&self.export_dir)?;

        let mut groups: BTreeMap<(String, String), Vec<&ExportCandidate>> = BTreeMap::new();
        for candidate in candidates {
            groups.entry(candidate.group_key()).or_default().push(candidate);
        }

        let mut written = Vec::new();
        for ((business_entity, company), mut rows) in groups {
            rows.sort_by(|a, b| a.meter_code.cmp(&b.meter_code));

            let file_name = self.file_name(&business_entity, &company, day);
            let path = self.export_dir.join(&file_name);

            let mut content = String::new();
            for row in &rows {
                content.push_str(&self.format_row(row));
                content.push('\n');
            }
            fs::write(&path, content)?;

            info!(file = %path.display(), rows = rows.len(), "export file written");
            written.push(path);
        }

        Ok(written)
    }

    /// Filename from the configured template:
    /// {business_entity}_{company}_{day}_{month}_{year}.csv
    fn file_name(&self, business_entity: &str, company: &str, day: NaiveDate) -> String {
        use chrono::Datelike;
        self.template
            .replace("{business_entity}", business_entity)
            .replace("{company}", company)
            .replace("{day}", &format!("{:02}", day.day()))
            .replace("{month}", &format!("{:02}", day.month()))
            .replace("{year}", &day.year().to_string())
    }

    fn format_row(&self, c: &ExportCandidate) -> String {
        let fields = [
            c.meter_code.clone(),
            c.measuring_point.to_string(),
            c.customer_name.clone().unwrap_or_default(),
            c.contract_number.clone().unwrap_or_default(),
            format!("{:.2}", c.reading_value),
            c.reading_recorded_at.format("%Y%m%d").to_string(),
            c.ro_date.map(|d| d.format("%Y%m%d").to_string()).unwrap_or_default(),
        ];

        fields
            .iter()
            .map(|f| self.escape_field(f))
            .collect::<Vec<_>>()
            .join(&self.delimiter.to_string())
    }

    /// No enclosure: the delimiter, backslash and line breaks inside
    /// a field are backslash-escaped instead.
    fn escape_field(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for ch in raw.chars() {
            if ch == '\\' || ch == self.delimiter || ch == '\n' || ch == '\r' {
                out.push('\\');
            }
            out.push(if ch == '\n' || ch == '\r' { 'n' } else { ch });
        }
        out
    }
}

/// Move a consumed export file to the archive directory (sibling
/// ARCHIVE tree). SAP consumption itself is external; this runs on
/// the next cycle for files SAP has picked up.
pub fn archive_export_file(file: &Path, archive_dir: &Path) -> ExchangeResult<PathBuf> {
    crate::exchange::archiver::Archiver::archive(file, archive_dir)
}
