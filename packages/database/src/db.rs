//! Connection setup and shared schema.
//!
//! Trade and raw tables depend on the feed definition and are created by
//! [`crate::trades::create_trade_tables`]. The location and failure tables
//! are shared by every feed and created here.

use std::path::Path;

use duckdb::Connection;

use crate::DbError;

/// Resolved building positions, one row per location identity.
pub const LOCATION_TABLE: &str = "apt_location";

/// Append-only log of failed resolution attempts.
pub const FAILURE_TABLE: &str = "geocode_fail";

/// Opens (or creates) the database file and ensures the shared schema
/// exists.
///
/// # Errors
///
/// Returns [`DbError`] if the directory, connection, or schema creation
/// fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;

    log::debug!("Opened database at {}", path.display());
    Ok(conn)
}

/// Opens a throwaway in-memory database with the shared schema.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS apt_location (
            lawd_cd TEXT NOT NULL,
            umd_nm TEXT NOT NULL,
            apt_nm TEXT NOT NULL,
            jibun TEXT NOT NULL,
            lat DOUBLE NOT NULL,
            lng DOUBLE NOT NULL,
            matched_address TEXT,
            place_id TEXT,
            strategy TEXT NOT NULL,
            updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (lawd_cd, umd_nm, apt_nm, jibun)
        );

        CREATE TABLE IF NOT EXISTS geocode_fail (
            lawd_cd TEXT NOT NULL,
            umd_nm TEXT NOT NULL,
            apt_nm TEXT NOT NULL,
            jibun TEXT NOT NULL,
            query_text TEXT NOT NULL,
            reason TEXT NOT NULL,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    Ok(())
}

/// Whether `table` exists in the main schema.
///
/// # Errors
///
/// Returns [`DbError`] if the catalog query fails.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, DbError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
        duckdb::params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Returns `COUNT(*)` for `table`, or `None` if the table does not exist.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the count is negative.
pub fn count_rows(conn: &Connection, table: &str) -> Result<Option<u64>, DbError> {
    if !table_exists(conn, table)? {
        return Ok(None);
    }

    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })?;

    u64::try_from(count)
        .map(Some)
        .map_err(|_| DbError::Conversion {
            message: format!("negative row count for {table}: {count}"),
        })
}
