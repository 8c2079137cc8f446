#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for ingesting apartment transactions into `DuckDB` and geocoding
//! the buildings they refer to.
//!
//! * [`engine`] drives a feed across region × month units, one page at a
//!   time.
//! * [`geocode`] fills in positions for every building identity that lacks
//!   one.
//! * [`config`] holds the immutable run configuration.

pub mod config;
pub mod engine;
pub mod geocode;
pub mod refresh;

use clap::ValueEnum;
use proptech_source::source_def::SourceDefinition;

/// Errors that abort a unit, a job, or the run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Fetching or parsing a page failed.
    #[error(transparent)]
    Source(#[from] proptech_source::SourceError),

    /// A database operation failed.
    #[error(transparent)]
    Db(#[from] proptech_database::DbError),

    /// Building the geocoding client failed.
    #[error(transparent)]
    Geocode(#[from] proptech_geocoder::GeocodeError),

    /// The run configuration is unusable.
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    /// A registry entry the binary depends on is missing.
    #[error("Unknown {kind}: {id}")]
    Unknown {
        /// What was looked up (e.g., `"source"`).
        kind: &'static str,
        /// The missing id.
        id: String,
    },
}

/// Which transaction feeds a job covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Domain {
    /// Sale transactions only.
    #[default]
    Sale,
    /// Rental transactions only.
    Rent,
    /// Sale, then rental.
    All,
}

impl Domain {
    /// Feed ids covered by this domain, in processing order.
    #[must_use]
    pub const fn source_ids(self) -> &'static [&'static str] {
        match self {
            Self::Sale => &["apt_trade"],
            Self::Rent => &["apt_rent"],
            Self::All => &["apt_trade", "apt_rent"],
        }
    }

    /// Resolves the feed definitions for this domain.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Unknown`] if a feed is missing from the
    /// registry.
    pub fn sources(self) -> Result<Vec<SourceDefinition>, IngestError> {
        self.source_ids()
            .iter()
            .map(|id| {
                proptech_source::registry::find_source(id).ok_or_else(|| IngestError::Unknown {
                    kind: "source",
                    id: (*id).to_string(),
                })
            })
            .collect()
    }
}

/// Returns all configured feeds from the TOML registry.
#[must_use]
pub fn all_sources() -> Vec<SourceDefinition> {
    proptech_source::registry::all_sources()
}

/// Trade tables of every registered feed, used to find identities that
/// still need a position.
#[must_use]
pub fn trade_tables(sources: &[SourceDefinition]) -> Vec<&str> {
    sources.iter().map(|s| s.table.as_str()).collect()
}
