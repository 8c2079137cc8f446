//! Config-driven transaction feed definition.
//!
//! [`SourceDefinition`] captures everything unique about a feed (endpoint,
//! field names, target table, write mode, raw preservation) in a
//! deserializable struct. One generic implementation serves every feed.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use proptech_trade_models::{FieldValue, LocationKey, TradeKey, TradeRecord};
use serde::Deserialize;

use crate::SourceError;
use crate::parsing::{first_text, parse_decimal, parse_integer};

/// Key columns shared by every trade table, in persisted order.
///
/// `deal_ymd` is derived from the deal date and is not part of the primary
/// key.
pub const KEY_COLUMNS: &[&str] = &[
    "lawd_cd",
    "umd_nm",
    "apt_nm",
    "jibun",
    "deal_year",
    "deal_month",
    "deal_day",
];

/// Derived column holding the `YYYYMM` of the deal date.
pub const DEAL_YMD_COLUMN: &str = "deal_ymd";

// ── Top-level definition ─────────────────────────────────────────────────

/// A complete, config-driven feed definition.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g., `"apt_trade"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Table receiving normalized trade rows.
    pub table: String,
    /// Table receiving verbatim page copies. `None` disables raw
    /// preservation for the feed.
    #[serde(default)]
    pub raw_table: Option<String>,
    /// Conflict handling for rows whose natural key already exists.
    #[serde(default)]
    pub write_mode: WriteMode,
    /// Upstream endpoint settings.
    pub endpoint: EndpointConfig,
    /// Field name mappings for normalization.
    pub fields: FieldMapping,
}

/// Conflict handling when a natural key already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Keep the stored row untouched.
    #[default]
    InsertOrIgnore,
    /// Overwrite every non-key column.
    InsertOrUpdate,
}

/// Upstream endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Query endpoint URL.
    pub url: String,
    /// Rows requested per page (`numOfRows`).
    pub page_size: u32,
    /// Flat delay before every request, in milliseconds.
    pub delay_ms: u64,
    /// Per-request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// `resultCode` signalling success.
    #[serde(default = "default_success_code")]
    pub success_code: String,
}

const fn default_timeout_secs() -> u64 {
    20
}

fn default_success_code() -> String {
    "000".to_string()
}

// ── Field mapping ────────────────────────────────────────────────────────

/// Maps payload field names to key fields and attribute columns.
///
/// Each list holds aliases tried in order; the first non-empty wins.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMapping {
    /// Region code field names.
    pub region_code: Vec<String>,
    /// Neighborhood field names.
    pub neighborhood: Vec<String>,
    /// Building name field names.
    pub building_name: Vec<String>,
    /// Lot number field names (optional in the payload).
    pub lot_number: Vec<String>,
    /// Contract year field names.
    pub deal_year: Vec<String>,
    /// Contract month field names.
    pub deal_month: Vec<String>,
    /// Contract day field names.
    pub deal_day: Vec<String>,
    /// Non-key attribute columns.
    #[serde(default)]
    pub attributes: Vec<AttributeField>,
}

/// One attribute column and how to extract it.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeField {
    /// Destination column name.
    pub column: String,
    /// Payload field names, tried in order.
    pub names: Vec<String>,
    /// Value type.
    #[serde(default)]
    pub kind: FieldKind,
    /// Items lacking this field are dropped.
    #[serde(default)]
    pub required: bool,
}

/// Type of an attribute column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Trimmed text.
    #[default]
    Text,
    /// Whole number; thousands separators are stripped.
    Integer,
    /// Decimal number; thousands separators are stripped.
    Decimal,
}

impl FieldKind {
    /// SQL column type used when creating trade tables.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "BIGINT",
            Self::Decimal => "DOUBLE",
        }
    }

    /// Converts raw text to a typed value. `None` means absent.
    #[must_use]
    pub fn convert(self, raw: &str) -> Option<FieldValue> {
        match self {
            Self::Text => Some(FieldValue::Text(raw.to_string())),
            Self::Integer => parse_integer(raw).map(FieldValue::Integer),
            Self::Decimal => parse_decimal(raw).map(FieldValue::Decimal),
        }
    }
}

impl AttributeField {
    fn extract(&self, record: &serde_json::Value) -> Option<FieldValue> {
        let raw = first_text(record, &self.names)?;
        self.kind.convert(&raw)
    }
}

// ── Normalization ────────────────────────────────────────────────────────

impl SourceDefinition {
    /// Returns the unique feed identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable feed name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rows requested per page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.endpoint.page_size
    }

    /// Checks that table and column names are plain SQL identifiers and
    /// that attribute columns do not shadow key columns.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<(), SourceError> {
        let config_err = |message: String| Err(SourceError::Config { message });

        if self.endpoint.page_size == 0 {
            return config_err(format!("{}: page_size must be positive", self.id));
        }
        if !is_identifier(&self.table) {
            return config_err(format!("{}: invalid table name '{}'", self.id, self.table));
        }
        if let Some(raw) = &self.raw_table
            && !is_identifier(raw)
        {
            return config_err(format!("{}: invalid raw table name '{raw}'", self.id));
        }

        let required_aliases = [
            ("region_code", &self.fields.region_code),
            ("neighborhood", &self.fields.neighborhood),
            ("building_name", &self.fields.building_name),
            ("deal_year", &self.fields.deal_year),
            ("deal_month", &self.fields.deal_month),
            ("deal_day", &self.fields.deal_day),
        ];
        for (label, names) in required_aliases {
            if names.is_empty() {
                return config_err(format!("{}: no field names for {label}", self.id));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for attr in &self.fields.attributes {
            if !is_identifier(&attr.column)
                || KEY_COLUMNS.contains(&attr.column.as_str())
                || attr.column == DEAL_YMD_COLUMN
            {
                return config_err(format!("{}: invalid column '{}'", self.id, attr.column));
            }
            if !seen.insert(attr.column.as_str()) {
                return config_err(format!("{}: duplicate column '{}'", self.id, attr.column));
            }
            if attr.names.is_empty() {
                return config_err(format!("{}: no field names for {}", self.id, attr.column));
            }
        }

        Ok(())
    }

    /// Normalizes one payload item.
    ///
    /// Returns `None` if a required field is missing or the contract date is
    /// not a real calendar date.
    #[must_use]
    pub fn normalize_item(&self, item: &serde_json::Value) -> Option<TradeRecord> {
        let fields = &self.fields;

        let region_code = first_text(item, &fields.region_code)?;
        let neighborhood = first_text(item, &fields.neighborhood)?;
        let building_name = first_text(item, &fields.building_name)?;
        let lot_number = first_text(item, &fields.lot_number);

        let year = first_text(item, &fields.deal_year).and_then(|s| parse_integer(&s))?;
        let month = first_text(item, &fields.deal_month).and_then(|s| parse_integer(&s))?;
        let day = first_text(item, &fields.deal_day).and_then(|s| parse_integer(&s))?;
        let deal_date = NaiveDate::from_ymd_opt(
            i32::try_from(year).ok()?,
            u32::try_from(month).ok()?,
            u32::try_from(day).ok()?,
        )?;

        let mut attributes = BTreeMap::new();
        for attr in &fields.attributes {
            match attr.extract(item) {
                Some(value) => {
                    attributes.insert(attr.column.clone(), value);
                }
                None if attr.required => return None,
                None => {}
            }
        }

        Some(TradeRecord {
            key: TradeKey {
                location: LocationKey {
                    region_code,
                    neighborhood,
                    building_name,
                    lot_number,
                },
                deal_date,
            },
            attributes,
        })
    }

    /// Normalizes a page of items, silently dropping malformed ones.
    #[must_use]
    pub fn normalize_page(&self, items: &[serde_json::Value]) -> Vec<TradeRecord> {
        let records: Vec<TradeRecord> = items
            .iter()
            .filter_map(|item| self.normalize_item(item))
            .collect();

        let dropped = items.len() - records.len();
        if dropped > 0 {
            log::debug!(
                "{}: dropped {dropped}/{} items missing required fields",
                self.id,
                items.len()
            );
        }

        records
    }

    /// Names of the attribute columns, in definition order.
    #[must_use]
    pub fn attribute_columns(&self) -> Vec<&str> {
        self.fields
            .attributes
            .iter()
            .map(|a| a.column.as_str())
            .collect()
    }
}

/// Returns `true` for `[a-z_][a-z0-9_]*`.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Parses and validates a [`SourceDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed, missing required fields, or
/// fails [`SourceDefinition::validate`].
pub fn parse_source_toml(toml_str: &str) -> Result<SourceDefinition, String> {
    let def: SourceDefinition = toml::de::from_str(toml_str).map_err(|e| e.to_string())?;
    def.validate().map_err(|e| e.to_string())?;
    Ok(def)
}
