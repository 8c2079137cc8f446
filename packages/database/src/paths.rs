//! Canonical file paths for the `DuckDB` data directory.

use std::path::{Path, PathBuf};

/// Data directory, relative to the working directory.
const DATA_DIR: &str = "data";

/// Returns the default database file path.
#[must_use]
pub fn default_db_path() -> PathBuf {
    Path::new(DATA_DIR).join("proptech.duckdb")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
