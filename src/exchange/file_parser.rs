// ==========================================
// SAP Meter Exchange - Feed file parser
// ==========================================
// Reads one feed file into row records (column name -> raw string).
// The caller supplies the entity column schema; when the first row
// matches the schema names it is treated as a header, otherwise
// columns map positionally. Format tolerance (BOM, mixed line
// endings, blank lines, short rows) lives here; business meaning
// does not.
// ==========================================

use crate::exchange::error::{ExchangeError, ExchangeResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

// ==========================================
// RawRow
// ==========================================
/// One parsed feed row. `number` is the 1-based physical row in the
/// file (header included), kept for error reporting.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub number: usize,
    pub values: HashMap<String, String>,
}

impl RawRow {
    /// Trimmed, non-empty value for a column; None when the column is
    /// missing (short row) or blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// True when the row carries fewer columns than the schema. The
    /// reconciler decides whether the missing fields matter.
    pub fn is_short(&self, schema: &[&str]) -> bool {
        self.values.len() < schema.len()
    }
}

// ==========================================
// CsvParser
// ==========================================
pub struct CsvParser {
    delimiter: u8,
}

impl CsvParser {
    /// The delimiter must be a single ASCII character; anything wider
    /// cannot be represented as the csv crate's delimiter byte.
    pub fn new(delimiter: char) -> ExchangeResult<Self> {
        if !delimiter.is_ascii() {
            return Err(
                anyhow::anyhow!("feed delimiter must be ASCII, got {delimiter:?}").into(),
            );
        }
        Ok(Self {
            delimiter: delimiter as u8,
        })
    }

    /// Parse a feed file against an entity schema.
    ///
    /// Deterministic: re-parsing the same file yields the same rows.
    /// An unreadable file or broken CSV structure is `MalformedFile`;
    /// short rows are NOT - they surface per row downstream.
    pub fn parse(&self, path: &Path, schema: &[&str]) -> ExchangeResult<Vec<RawRow>> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let file = File::open(path).map_err(|e| ExchangeError::MalformedFile {
            file: file_name.clone(),
            message: format!("cannot open: {e}"),
        })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(file);

        let mut rows = Vec::new();
        let mut first_data_row = true;

        for (idx, result) in reader.records().enumerate() {
            let record = result.map_err(|e| ExchangeError::MalformedFile {
                file: file_name.clone(),
                message: e.to_string(),
            })?;
            // The reader position carries the true file line, so row
            // numbers stay correct across interior blank lines the
            // csv crate swallows before we see them.
            let number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 1);

            let cells: Vec<String> = record
                .iter()
                .enumerate()
                .map(|(i, raw)| {
                    // The UTF-8 BOM ends up glued to the first cell
                    let cell = if i == 0 && idx == 0 {
                        raw.trim_start_matches('\u{feff}')
                    } else {
                        raw
                    };
                    cell.trim().to_string()
                })
                .collect();

            // Trailing blank lines and stray empty rows
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }

            if first_data_row {
                first_data_row = false;
                if Self::is_header_row(&cells, schema) {
                    continue;
                }
            }

            let mut values = HashMap::new();
            for (col_idx, cell) in cells.into_iter().enumerate() {
                if let Some(column) = schema.get(col_idx) {
                    values.insert((*column).to_string(), cell);
                }
            }

            rows.push(RawRow { number, values });
        }

        Ok(rows)
    }

    /// A first row whose cells equal the schema names
    /// (case-insensitive) is a header row.
    fn is_header_row(cells: &[String], schema: &[&str]) -> bool {
        cells.len() == schema.len()
            && cells
                .iter()
                .zip(schema.iter())
                .all(|(cell, column)| cell.eq_ignore_ascii_case(column))
    }
}
