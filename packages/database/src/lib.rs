#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` storage for transactions, raw pages, and resolved locations.
//!
//! All writes are keyed on natural composite identities; no surrogate ids
//! are used for conflict detection. Callers own the transaction scope:
//! every function takes a plain [`duckdb::Connection`] reference, which a
//! [`duckdb::Transaction`] derefs to.

pub mod db;
pub mod locations;
pub mod paths;
pub mod trades;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query or connection error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error while preparing the database path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
