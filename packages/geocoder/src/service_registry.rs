//! Compile-time registry of geocoding service configurations.
//!
//! Each service is defined in a TOML file under `services/`. Besides the
//! endpoints and pacing, a service carries the human-readable names of the
//! regions it can build queries for.

use std::collections::BTreeMap;

use serde::Deserialize;

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"kakao"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
    /// Region names keyed by region code.
    #[serde(default)]
    pub regions: BTreeMap<String, RegionName>,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Kakao Local search API.
    Kakao {
        /// Address search endpoint.
        address_url: String,
        /// Keyword (place) search endpoint.
        keyword_url: String,
        /// Flat delay before every lookup, in milliseconds.
        rate_limit_ms: u64,
        /// Per-request timeout, in seconds.
        timeout_secs: u64,
        /// Identities resolved per committed batch.
        batch_size: usize,
    },
}

/// Administrative names used in query strings for one region code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionName {
    /// Top-level province (e.g., `"제주특별자치도"`).
    pub province: String,
    /// City within the province (e.g., `"제주시"`).
    pub city: String,
}

impl GeocodingService {
    /// Flat pacing delay in milliseconds.
    #[must_use]
    pub const fn rate_limit_ms(&self) -> u64 {
        match &self.provider {
            ProviderConfig::Kakao { rate_limit_ms, .. } => *rate_limit_ms,
        }
    }

    /// Default batch size for the fill driver.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        match &self.provider {
            ProviderConfig::Kakao { batch_size, .. } => *batch_size,
        }
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const SERVICE_TOMLS: &[(&str, &str)] = &[("kakao", include_str!("../services/kakao.toml"))];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 1;

/// Returns all geocoding service configurations.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse geocoding service '{name}': {e}"))
        })
        .collect()
}

/// Looks up a service by id.
#[must_use]
pub fn find_service(id: &str) -> Option<GeocodingService> {
    all_services().into_iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_services() {
        assert_eq!(all_services().len(), EXPECTED_SERVICE_COUNT);
    }

    #[test]
    fn service_ids_are_unique() {
        let mut seen = BTreeSet::new();
        for svc in &all_services() {
            assert!(seen.insert(svc.id.clone()), "Duplicate service ID: {}", svc.id);
        }
    }

    #[test]
    fn kakao_has_endpoints_and_pacing() {
        let kakao = find_service("kakao").unwrap();
        let ProviderConfig::Kakao {
            address_url,
            keyword_url,
            timeout_secs,
            ..
        } = &kakao.provider;
        assert!(address_url.ends_with("/search/address.json"));
        assert!(keyword_url.ends_with("/search/keyword.json"));
        assert_eq!(*timeout_secs, 15);
        assert_eq!(kakao.rate_limit_ms(), 120);
        assert_eq!(kakao.batch_size(), 200);
    }

    #[test]
    fn jeju_regions_are_named() {
        let kakao = find_service("kakao").unwrap();
        assert_eq!(kakao.regions["50110"].city, "제주시");
        assert_eq!(kakao.regions["50130"].city, "서귀포시");
        for region in kakao.regions.values() {
            assert_eq!(region.province, "제주특별자치도");
        }
    }
}
