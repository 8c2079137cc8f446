//! Kakao Local search client.
//!
//! Both endpoints take a single `query` parameter and answer with
//! `{"documents": [...], "meta": {...}}`. Only the first document is used.
//! Coordinates arrive as strings: `x` is longitude, `y` is latitude.
//!
//! See <https://developers.kakao.com/docs/latest/ko/local/dev-guide>

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::service_registry::{GeocodingService, ProviderConfig};
use crate::{Candidate, GeocodeError, LocalSearch};

/// HTTP client for the Kakao Local address and keyword endpoints.
#[derive(Debug, Clone)]
pub struct KakaoClient {
    client: reqwest::Client,
    address_url: String,
    keyword_url: String,
    authorization: String,
}

impl KakaoClient {
    /// Builds a client from a service configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Config`] if the key is blank, or
    /// [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn from_service(service: &GeocodingService, api_key: &str) -> Result<Self, GeocodeError> {
        let ProviderConfig::Kakao {
            address_url,
            keyword_url,
            timeout_secs,
            ..
        } = &service.provider;

        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(GeocodeError::Config {
                message: format!("{}: REST API key is empty", service.id),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(*timeout_secs))
            .build()?;

        Ok(Self {
            client,
            address_url: address_url.clone(),
            keyword_url: keyword_url.clone(),
            authorization: format!("KakaoAK {api_key}"),
        })
    }

    async fn get(&self, url: &str, query: &str) -> Result<Value, GeocodeError> {
        log::trace!("GET {url} query={query}");

        let body = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .query(&[("query", query)])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        Ok(body)
    }
}

#[async_trait]
impl LocalSearch for KakaoClient {
    async fn search_address(&self, query: &str) -> Result<Option<Candidate>, GeocodeError> {
        let body = self.get(&self.address_url, query).await?;
        parse_address_response(&body)
    }

    async fn search_keyword(&self, query: &str) -> Result<Option<Candidate>, GeocodeError> {
        let body = self.get(&self.keyword_url, query).await?;
        parse_keyword_response(&body)
    }
}

fn first_document(body: &Value) -> Result<Option<&Value>, GeocodeError> {
    let documents = body["documents"]
        .as_array()
        .ok_or_else(|| GeocodeError::Parse {
            message: "Kakao response has no documents array".to_string(),
        })?;
    Ok(documents.first())
}

fn coordinate(doc: &Value, field: &str) -> Result<f64, GeocodeError> {
    let parsed = match &doc[field] {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| GeocodeError::Parse {
        message: format!("Missing {field} in Kakao document"),
    })
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Parses an address search response.
///
/// The label is the lot-based `address.address_name`, falling back to the
/// top-level `address_name`.
///
/// # Errors
///
/// Returns [`GeocodeError::Parse`] if the body has no `documents` array or
/// the first document lacks coordinates.
pub fn parse_address_response(body: &Value) -> Result<Option<Candidate>, GeocodeError> {
    let Some(doc) = first_document(body)? else {
        return Ok(None);
    };

    Ok(Some(Candidate {
        latitude: coordinate(doc, "y")?,
        longitude: coordinate(doc, "x")?,
        matched_address: non_empty(&doc["address"]["address_name"])
            .or_else(|| non_empty(&doc["address_name"])),
        place_id: None,
    }))
}

/// Parses a keyword search response.
///
/// The label is `address_name`, falling back to `road_address_name`; the
/// place `id` is kept.
///
/// # Errors
///
/// Returns [`GeocodeError::Parse`] if the body has no `documents` array or
/// the first document lacks coordinates.
pub fn parse_keyword_response(body: &Value) -> Result<Option<Candidate>, GeocodeError> {
    let Some(doc) = first_document(body)? else {
        return Ok(None);
    };

    Ok(Some(Candidate {
        latitude: coordinate(doc, "y")?,
        longitude: coordinate(doc, "x")?,
        matched_address: non_empty(&doc["address_name"])
            .or_else(|| non_empty(&doc["road_address_name"])),
        place_id: non_empty(&doc["id"]),
    }))
}
