#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Transaction, location, and ingestion-unit types.
//!
//! Every feed (sale, rental) produces [`TradeRecord`] values keyed by a
//! [`TradeKey`]. The location-relevant subset of that key, [`LocationKey`],
//! is shared with the geocoding side so that a [`LocationRecord`] positions
//! every trade of the same building regardless of transaction date.

pub mod period;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use period::{ParseYearMonthError, YearMonth};

/// One unit of ingestion work: a region code and a calendar month.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionUnit {
    /// Opaque 5-character administrative region code (e.g. `"50110"`).
    pub region_code: String,
    /// Month whose transactions this unit covers.
    pub period: YearMonth,
}

impl IngestionUnit {
    /// Creates a unit.
    #[must_use]
    pub fn new(region_code: impl Into<String>, period: YearMonth) -> Self {
        Self {
            region_code: region_code.into(),
            period,
        }
    }
}

impl fmt::Display for IngestionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.region_code, self.period)
    }
}

/// Identity of a building: the location-relevant part of a trade's key.
///
/// An absent lot number is a legitimate identity component; it is stored
/// as the empty string so composite-key conflicts are still detected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationKey {
    /// Administrative region code (`sggCd`).
    pub region_code: String,
    /// Neighborhood (`umdNm`).
    pub neighborhood: String,
    /// Building / complex name (`aptNm`).
    pub building_name: String,
    /// Lot number (`jibun`), if the feed reported one.
    pub lot_number: Option<String>,
}

impl LocationKey {
    /// Lot number as persisted (empty string when absent).
    #[must_use]
    pub fn lot_number_key(&self) -> &str {
        self.lot_number.as_deref().unwrap_or("")
    }

    /// Identity rendered as `region|neighborhood|lot|building`, used as the
    /// query text of geocode failure rows.
    #[must_use]
    pub fn query_text(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.region_code,
            self.neighborhood,
            self.lot_number_key(),
            self.building_name
        )
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query_text())
    }
}

/// Natural key of a transaction row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeKey {
    /// Building identity.
    pub location: LocationKey,
    /// Contract date.
    pub deal_date: NaiveDate,
}

impl TradeKey {
    /// The `YYYYMM` period of the contract date.
    #[must_use]
    pub fn deal_ymd(&self) -> YearMonth {
        YearMonth::from_date(self.deal_date)
    }
}

/// A typed non-key attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Whole number (amounts in 10,000 KRW, floors, years).
    Integer(i64),
    /// Decimal number (areas in m²).
    Decimal(f64),
    /// Free text.
    Text(String),
}

/// One normalized transaction.
///
/// `attributes` only holds fields that were present in the payload; absent
/// fields are persisted as `NULL`, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    /// Natural key.
    pub key: TradeKey,
    /// Feed-specific attributes keyed by column name.
    pub attributes: BTreeMap<String, FieldValue>,
}

impl TradeRecord {
    /// Looks up an attribute by column name.
    #[must_use]
    pub fn attribute(&self, column: &str) -> Option<&FieldValue> {
        self.attributes.get(column)
    }
}

/// Which resolver strategy produced a position.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Postal-style lot address search.
    AddressSearch,
    /// Building-name keyword / place search.
    KeywordSearch,
}

/// A resolved geocoded position for a building identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    /// Building identity (same shape as the trades it positions).
    pub key: LocationKey,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Address label returned by the geocoder.
    pub matched_address: Option<String>,
    /// Place identifier (keyword search only).
    pub place_id: Option<String>,
    /// Strategy that produced the match.
    pub strategy: ResolutionStrategy,
}

/// One failed resolution attempt. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeFailure {
    /// Building identity that could not be resolved.
    pub key: LocationKey,
    /// Query text describing the attempt.
    pub query_text: String,
    /// `"no result"` or the error text.
    pub reason: String,
}

/// Verbatim audit copy of a single page fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPage {
    /// Unit the page belongs to.
    pub unit: IngestionUnit,
    /// 1-based page number.
    pub page_no: u32,
    /// Requested rows per page.
    pub page_size: u32,
    /// Status code reported by the upstream API.
    pub result_code: String,
    /// Status message reported by the upstream API.
    pub result_msg: String,
    /// Declared total result count.
    pub total_count: u64,
    /// Raw response body.
    pub payload: String,
}
