// ==========================================
// SAP Meter Exchange - SQLite connection setup
// ==========================================
// Goals:
// - One place for Connection::open so every connection gets the same
//   PRAGMA behavior (foreign keys, busy_timeout)
// - Schema bootstrap for fresh databases
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// Default busy_timeout (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Apply the unified PRAGMA set to a connection
///
/// foreign_keys and busy_timeout are per-connection settings, so this
/// must run for every connection, not once per database.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a SQLite connection with the unified configuration
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Schema for the exchange store.
///
/// `meter_readings` is written by the (external) polling layer; the
/// exchange only reads it. `import_job_runs` is the audit trail for
/// pipeline runs, pruned by the configured retention.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS meters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    meter_code TEXT NOT NULL UNIQUE,
    serial_number TEXT,
    site_code TEXT,
    customer_name TEXT,
    contract_number TEXT,
    measuring_point INTEGER NOT NULL DEFAULT 0,
    business_entity TEXT,
    company TEXT,
    status TEXT NOT NULL DEFAULT 'INACTIVE',
    ro_date TEXT,
    last_seen_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_meters_site_code ON meters(site_code);
CREATE INDEX IF NOT EXISTS idx_meters_status ON meters(status);

CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_code TEXT NOT NULL UNIQUE,
    name TEXT,
    address TEXT,
    city TEXT,
    postal_code TEXT,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    first_name TEXT,
    last_name TEXT,
    email TEXT,
    role TEXT NOT NULL DEFAULT 'user',
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meter_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    meter_code TEXT NOT NULL,
    value REAL NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_readings_meter_recorded
    ON meter_readings(meter_code, recorded_at);

CREATE TABLE IF NOT EXISTS import_job_runs (
    run_id TEXT PRIMARY KEY,
    job_key TEXT NOT NULL,
    entity TEXT,
    source_tier TEXT,
    files_json TEXT NOT NULL,
    created_count INTEGER NOT NULL DEFAULT 0,
    updated_count INTEGER NOT NULL DEFAULT 0,
    deactivated_count INTEGER NOT NULL DEFAULT 0,
    exported_count INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0,
    errors_json TEXT NOT NULL,
    exclusions_json TEXT NOT NULL DEFAULT '[]',
    success INTEGER NOT NULL,
    skipped INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_job_runs_started ON import_job_runs(started_at);
"#;

/// Create the schema on a fresh database (idempotent)
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_bootstrap_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('meters','sites','users','meter_readings','import_job_runs')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
    }
}
