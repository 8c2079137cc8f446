//! Run configuration.
//!
//! Loaded once from the process environment (after `.env`, if present) and
//! then adjusted by command-line flags. Nothing reads the environment after
//! [`Config::from_env`] returns.

use std::path::PathBuf;

use proptech_trade_models::YearMonth;

/// Default region list: Jeju City and Seogwipo.
pub const DEFAULT_LAWD_CDS: &str = "50110,50130";
/// Default first backfill month.
pub const DEFAULT_START: &str = "200601";
/// Default last backfill month.
pub const DEFAULT_END: &str = "201912";
/// Default trailing window for daily runs, in months.
pub const DEFAULT_LOOKBACK_MONTHS: u32 = 3;

/// Configuration errors. All of them abort the run before any work starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A credential required by the selected job is missing.
    #[error("{key} is not set")]
    Missing {
        /// Environment variable name.
        key: &'static str,
    },

    /// A period is not a valid `YYYYMM`.
    #[error("{key}: {source}")]
    InvalidPeriod {
        /// Setting name.
        key: &'static str,
        /// Underlying parse error.
        source: proptech_trade_models::ParseYearMonthError,
    },

    /// A numeric setting is not a number.
    #[error("{key}: invalid number '{value}'")]
    InvalidNumber {
        /// Setting name.
        key: &'static str,
        /// Rejected value.
        value: String,
    },

    /// A numeric setting must be at least one.
    #[error("{key} must be positive")]
    NotPositive {
        /// Setting name.
        key: &'static str,
    },

    /// No region codes were given.
    #[error("region list is empty")]
    NoRegions,

    /// The backfill range is inverted.
    #[error("start {start} is after end {end}")]
    InvertedRange {
        /// First month.
        start: YearMonth,
        /// Last month.
        end: YearMonth,
    },
}

/// Immutable run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Transaction portal service key (`MOLIT_SERVICE_KEY`).
    pub molit_service_key: Option<String>,
    /// Kakao REST API key (`KAKAO_REST_API_KEY`).
    pub kakao_api_key: Option<String>,
    /// Database file (`PROPTECH_DB_PATH`).
    pub db_path: PathBuf,
    /// Region codes, in processing order (`LAWD_CDS`).
    pub lawd_cds: Vec<String>,
    /// First backfill month (`START_YYYYMM`).
    pub start: YearMonth,
    /// Last backfill month (`END_YYYYMM`).
    pub end: YearMonth,
    /// Trailing window for daily runs (`DAILY_LOOKBACK_MONTHS`).
    pub lookback_months: u32,
    /// Identities per geocoding batch (`GEOCODE_BATCH_SIZE`). Falls back
    /// to the geocoding service's own batch size when unset.
    pub geocode_batch_size: Option<usize>,
    /// Endpoint poked after a successful run (`API_REFRESH_URL`).
    pub refresh_url: Option<String>,
    /// Token sent with the refresh call (`ADMIN_TOKEN`).
    pub admin_token: Option<String>,
}

impl Config {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any setting is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through `lookup`. Blank values count as
    /// unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any setting is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            molit_service_key: get("MOLIT_SERVICE_KEY"),
            kakao_api_key: get("KAKAO_REST_API_KEY"),
            db_path: get("PROPTECH_DB_PATH")
                .map_or_else(proptech_database::paths::default_db_path, PathBuf::from),
            lawd_cds: parse_regions(&get("LAWD_CDS").unwrap_or_else(|| DEFAULT_LAWD_CDS.to_string())),
            start: parse_period(
                "START_YYYYMM",
                &get("START_YYYYMM").unwrap_or_else(|| DEFAULT_START.to_string()),
            )?,
            end: parse_period(
                "END_YYYYMM",
                &get("END_YYYYMM").unwrap_or_else(|| DEFAULT_END.to_string()),
            )?,
            lookback_months: get("DAILY_LOOKBACK_MONTHS")
                .map_or(Ok(DEFAULT_LOOKBACK_MONTHS), |v| {
                    parse_number("DAILY_LOOKBACK_MONTHS", &v)
                })?,
            geocode_batch_size: get("GEOCODE_BATCH_SIZE")
                .map(|v| parse_number("GEOCODE_BATCH_SIZE", &v))
                .transpose()?,
            refresh_url: get("API_REFRESH_URL"),
            admin_token: get("ADMIN_TOKEN"),
        };

        Ok(config)
    }

    /// Checks the settings every command relies on. Call after applying
    /// command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lawd_cds.is_empty() {
            return Err(ConfigError::NoRegions);
        }
        if self.lookback_months == 0 {
            return Err(ConfigError::NotPositive {
                key: "DAILY_LOOKBACK_MONTHS",
            });
        }
        if self.geocode_batch_size == Some(0) {
            return Err(ConfigError::NotPositive {
                key: "GEOCODE_BATCH_SIZE",
            });
        }
        Ok(())
    }

    /// Checks that the backfill range is not inverted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvertedRange`] if `start` is after `end`.
    pub fn validate_range(&self) -> Result<(), ConfigError> {
        if self.start > self.end {
            return Err(ConfigError::InvertedRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// The portal service key, required by every ingestion job.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if unset.
    pub fn service_key(&self) -> Result<&str, ConfigError> {
        self.molit_service_key
            .as_deref()
            .ok_or(ConfigError::Missing {
                key: "MOLIT_SERVICE_KEY",
            })
    }

    /// The Kakao key, required by the geocoding job.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if unset.
    pub fn kakao_key(&self) -> Result<&str, ConfigError> {
        self.kakao_api_key.as_deref().ok_or(ConfigError::Missing {
            key: "KAKAO_REST_API_KEY",
        })
    }
}

/// Splits a comma-separated region list, dropping blanks.
#[must_use]
pub fn parse_regions(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parses a `YYYYMM` setting.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPeriod`] if `value` is malformed.
pub fn parse_period(key: &'static str, value: &str) -> Result<YearMonth, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|source| ConfigError::InvalidPeriod { key, source })
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: value.to_string(),
    })
}
