//! Ordered-strategy location resolver.
//!
//! Strategies run in [`STRATEGIES`] order. A strategy whose query cannot be
//! built (missing region name, neighborhood, lot number or building name) is
//! skipped without a network call. The first candidate wins.

use std::collections::BTreeMap;

use proptech_source::pacing::Pacer;
use proptech_trade_models::{GeocodeFailure, LocationKey, LocationRecord, ResolutionStrategy};

use crate::service_registry::{GeocodingService, RegionName};
use crate::{GeocodeError, LocalSearch};

/// Reason recorded when every strategy came back empty.
pub const NO_RESULT: &str = "no result";

/// Lookup order.
pub const STRATEGIES: [ResolutionStrategy; 2] = [
    ResolutionStrategy::AddressSearch,
    ResolutionStrategy::KeywordSearch,
];

/// Outcome of resolving a single identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A position was found.
    Resolved(LocationRecord),
    /// No strategy produced a position, or a lookup failed.
    Failed(GeocodeFailure),
}

/// Resolves location identities against a [`LocalSearch`] backend.
pub struct Resolver<S> {
    search: S,
    regions: BTreeMap<String, RegionName>,
    pacer: Pacer,
}

impl<S: LocalSearch> Resolver<S> {
    /// Creates a resolver with explicit region names and pacing.
    #[must_use]
    pub const fn new(search: S, regions: BTreeMap<String, RegionName>, pacer: Pacer) -> Self {
        Self {
            search,
            regions,
            pacer,
        }
    }

    /// Creates a resolver using the region names and pacing of `service`.
    #[must_use]
    pub fn for_service(search: S, service: &GeocodingService) -> Self {
        Self::new(
            search,
            service.regions.clone(),
            Pacer::from_millis(service.rate_limit_ms()),
        )
    }

    /// The lookup backend.
    #[must_use]
    pub const fn search(&self) -> &S {
        &self.search
    }

    /// Address query: `"{province} {city} {neighborhood} {lot}"`.
    #[must_use]
    pub fn address_query(&self, key: &LocationKey) -> Option<String> {
        let region = self.regions.get(&key.region_code)?;
        let lot = key.lot_number.as_deref().filter(|s| !s.trim().is_empty())?;
        if key.neighborhood.trim().is_empty() {
            return None;
        }
        Some(format!(
            "{} {} {} {lot}",
            region.province, region.city, key.neighborhood
        ))
    }

    /// Keyword query: `"{building} {city}"`.
    #[must_use]
    pub fn keyword_query(&self, key: &LocationKey) -> Option<String> {
        let region = self.regions.get(&key.region_code)?;
        if key.building_name.trim().is_empty() {
            return None;
        }
        Some(format!("{} {}", key.building_name, region.city))
    }

    fn query_for(&self, strategy: ResolutionStrategy, key: &LocationKey) -> Option<String> {
        match strategy {
            ResolutionStrategy::AddressSearch => self.address_query(key),
            ResolutionStrategy::KeywordSearch => self.keyword_query(key),
        }
    }

    /// Runs the strategies in order and returns the first position found.
    ///
    /// `Ok(None)` means every applicable strategy answered with zero
    /// candidates (or none was applicable).
    ///
    /// # Errors
    ///
    /// Returns the first [`GeocodeError`] raised by a lookup; later
    /// strategies are not attempted.
    pub async fn resolve(&self, key: &LocationKey) -> Result<Option<LocationRecord>, GeocodeError> {
        for strategy in STRATEGIES {
            let Some(query) = self.query_for(strategy, key) else {
                log::trace!("{key}: {strategy} not applicable");
                continue;
            };

            self.pacer.wait().await;

            let found = match strategy {
                ResolutionStrategy::AddressSearch => self.search.search_address(&query).await?,
                ResolutionStrategy::KeywordSearch => self.search.search_keyword(&query).await?,
            };

            if let Some(candidate) = found {
                log::debug!("{key}: resolved by {strategy} ({query})");
                return Ok(Some(LocationRecord {
                    key: key.clone(),
                    latitude: candidate.latitude,
                    longitude: candidate.longitude,
                    matched_address: candidate.matched_address,
                    place_id: candidate.place_id,
                    strategy,
                }));
            }
        }

        Ok(None)
    }

    /// Like [`Self::resolve`], but turns exhaustion and lookup errors into
    /// a [`GeocodeFailure`] so one identity can never abort a batch.
    pub async fn resolve_or_fail(&self, key: &LocationKey) -> Resolution {
        let reason = match self.resolve(key).await {
            Ok(Some(record)) => return Resolution::Resolved(record),
            Ok(None) => NO_RESULT.to_string(),
            Err(e) => e.to_string(),
        };

        log::warn!("{key}: geocode failed: {reason}");
        Resolution::Failed(GeocodeFailure {
            key: key.clone(),
            query_text: key.query_text(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::Candidate;
    use crate::service_registry::find_service;

    /// Call-counting stub with canned answers.
    #[derive(Default)]
    struct StubSearch {
        address_hit: bool,
        keyword_hit: bool,
        address_fails: bool,
        address_calls: AtomicUsize,
        keyword_calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
    }

    fn candidate(place_id: Option<&str>) -> Candidate {
        Candidate {
            latitude: 33.48,
            longitude: 126.48,
            matched_address: Some("제주특별자치도 제주시 노형동 925".to_string()),
            place_id: place_id.map(String::from),
        }
    }

    #[async_trait]
    impl LocalSearch for StubSearch {
        async fn search_address(&self, query: &str) -> Result<Option<Candidate>, GeocodeError> {
            self.address_calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            if self.address_fails {
                return Err(GeocodeError::Parse {
                    message: "boom".to_string(),
                });
            }
            Ok(self.address_hit.then(|| candidate(None)))
        }

        async fn search_keyword(&self, query: &str) -> Result<Option<Candidate>, GeocodeError> {
            self.keyword_calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.keyword_hit.then(|| candidate(Some("8123456"))))
        }
    }

    fn resolver(stub: StubSearch) -> Resolver<StubSearch> {
        let service = find_service("kakao").unwrap();
        Resolver::new(stub, service.regions, Pacer::from_millis(0))
    }

    fn key(apt: &str, lot: Option<&str>) -> LocationKey {
        LocationKey {
            region_code: "50110".to_string(),
            neighborhood: "노형동".to_string(),
            building_name: apt.to_string(),
            lot_number: lot.map(String::from),
        }
    }

    #[tokio::test]
    async fn address_hit_never_calls_keyword() {
        let r = resolver(StubSearch {
            address_hit: true,
            keyword_hit: true,
            ..StubSearch::default()
        });
        let record = r.resolve(&key("노형아이파크", Some("925"))).await.unwrap().unwrap();

        assert_eq!(record.strategy, ResolutionStrategy::AddressSearch);
        assert_eq!(r.search.address_calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.search.keyword_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            r.search.queries.lock().unwrap().as_slice(),
            ["제주특별자치도 제주시 노형동 925"]
        );
    }

    #[tokio::test]
    async fn falls_back_to_keyword_search() {
        let r = resolver(StubSearch {
            keyword_hit: true,
            ..StubSearch::default()
        });
        let record = r.resolve(&key("노형아이파크", Some("925"))).await.unwrap().unwrap();

        assert_eq!(record.strategy, ResolutionStrategy::KeywordSearch);
        assert_eq!(record.place_id.as_deref(), Some("8123456"));
        assert_eq!(
            r.search.queries.lock().unwrap().as_slice(),
            ["제주특별자치도 제주시 노형동 925", "노형아이파크 제주시"]
        );
    }

    #[tokio::test]
    async fn missing_lot_skips_address_search() {
        let r = resolver(StubSearch {
            address_hit: true,
            keyword_hit: true,
            ..StubSearch::default()
        });
        let record = r.resolve(&key("노형아이파크", None)).await.unwrap().unwrap();

        assert_eq!(record.strategy, ResolutionStrategy::KeywordSearch);
        assert_eq!(r.search.address_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_building_without_address_hit_is_no_result() {
        let r = resolver(StubSearch {
            keyword_hit: true,
            ..StubSearch::default()
        });
        let k = key("", Some("925"));

        let Resolution::Failed(failure) = r.resolve_or_fail(&k).await else {
            panic!("expected failure");
        };
        assert_eq!(failure.reason, NO_RESULT);
        assert_eq!(failure.query_text, "50110|노형동|925|");
        assert_eq!(r.search.address_calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.search.keyword_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_region_makes_no_calls() {
        let r = resolver(StubSearch {
            address_hit: true,
            keyword_hit: true,
            ..StubSearch::default()
        });
        let mut k = key("노형아이파크", Some("925"));
        k.region_code = "11110".to_string();

        assert!(r.resolve(&k).await.unwrap().is_none());
        assert_eq!(r.search.address_calls.load(Ordering::SeqCst), 0);
        assert_eq!(r.search.keyword_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lookup_error_becomes_failure_with_error_text() {
        let r = resolver(StubSearch {
            address_fails: true,
            keyword_hit: true,
            ..StubSearch::default()
        });
        let Resolution::Failed(failure) = r.resolve_or_fail(&key("A", Some("1"))).await else {
            panic!("expected failure");
        };
        assert_eq!(failure.reason, "Parse error: boom");
        assert_eq!(r.search.keyword_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paces_before_every_lookup() {
        let service = find_service("kakao").unwrap();
        let r = Resolver::for_service(StubSearch::default(), &service);
        let start = tokio::time::Instant::now();

        assert!(r.resolve(&key("A", Some("1"))).await.unwrap().is_none());

        assert!(start.elapsed() >= Duration::from_millis(240));
    }
}
