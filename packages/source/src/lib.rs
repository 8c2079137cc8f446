#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Transaction feed definitions, page fetching, and response parsing.
//!
//! Every feed is described by a [`source_def::SourceDefinition`] loaded from
//! an embedded TOML file. A single generic pipeline serves all feeds: a
//! [`PageFetcher`] returns the raw body of one page, and
//! [`response::parse_response`] turns it into normalized
//! [`proptech_trade_models::TradeRecord`]s using the feed's field map.

pub mod fetcher;
pub mod pacing;
pub mod parsing;
pub mod registry;
pub mod response;
pub mod source_def;

use async_trait::async_trait;
use proptech_trade_models::YearMonth;

/// Errors that can occur while fetching or parsing feed pages.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed or returned a non-2xx status.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload is not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload looks like XML but is not well-formed.
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Payload decodes but is not the expected envelope.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// Feed definition or request arguments are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

/// Retrieves one page of a feed.
///
/// Implementations issue exactly one outbound request per call and return
/// the body untouched. They never retry; retry policy belongs to the caller.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches page `page_no` (1-based) of `region_code` for `period`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport failure or a non-2xx status.
    async fn fetch(
        &self,
        region_code: &str,
        period: YearMonth,
        page_no: u32,
    ) -> Result<String, SourceError>;
}
