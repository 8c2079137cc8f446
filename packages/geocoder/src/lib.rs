#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding for apartment transaction locations.
//!
//! A [`resolver::Resolver`] tries lookup strategies in a fixed order and
//! stops at the first hit:
//!
//! 1. **Address search**: province, city, neighborhood and lot number
//!    against the address endpoint.
//! 2. **Keyword search**: building name and city against the place
//!    endpoint.
//!
//! The lookup backend is abstracted behind [`LocalSearch`]; the production
//! implementation is [`kakao::KakaoClient`]. Endpoints, pacing and region
//! names come from the [`service_registry`].

pub mod kakao;
pub mod resolver;
pub mod service_registry;

use async_trait::async_trait;
use thiserror::Error;

/// First candidate returned by a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Address label reported by the service.
    pub matched_address: Option<String>,
    /// Place identifier (keyword search only).
    pub place_id: Option<String>,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed or returned a non-2xx status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Client configuration is unusable.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// A local search service offering address and keyword lookups.
///
/// Each call is exactly one outbound request. `Ok(None)` means the service
/// answered with zero candidates.
#[async_trait]
pub trait LocalSearch: Send + Sync {
    /// Looks up a structured address.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport or parse failure.
    async fn search_address(&self, query: &str) -> Result<Option<Candidate>, GeocodeError>;

    /// Looks up a free-text place keyword.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport or parse failure.
    async fn search_keyword(&self, query: &str) -> Result<Option<Candidate>, GeocodeError>;
}
