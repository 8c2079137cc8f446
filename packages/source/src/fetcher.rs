//! HTTP implementation of [`PageFetcher`] for the transaction portal.
//!
//! No `_type` parameter is sent, so the portal answers in its default XML
//! envelope; [`crate::response::parse_response`] reads either format.

use std::time::Duration;

use async_trait::async_trait;
use proptech_trade_models::YearMonth;

use crate::pacing::Pacer;
use crate::source_def::SourceDefinition;
use crate::{PageFetcher, SourceError};

/// Fetches feed pages over HTTP, pacing every request.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    url: String,
    service_key: String,
    page_size: u32,
    pacer: Pacer,
}

impl HttpPageFetcher {
    /// Builds a fetcher for `source` authenticated with `service_key`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the key is blank, or
    /// [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(source: &SourceDefinition, service_key: &str) -> Result<Self, SourceError> {
        let service_key = service_key.trim();
        if service_key.is_empty() {
            return Err(SourceError::Config {
                message: format!("{}: service key is empty", source.id()),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(source.endpoint.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: source.endpoint.url.clone(),
            service_key: service_key.to_string(),
            page_size: source.page_size(),
            pacer: Pacer::from_millis(source.endpoint.delay_ms),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(
        &self,
        region_code: &str,
        period: YearMonth,
        page_no: u32,
    ) -> Result<String, SourceError> {
        if region_code.trim().is_empty() {
            return Err(SourceError::Config {
                message: "region code is empty".to_string(),
            });
        }

        self.pacer.wait().await;

        let deal_ymd = period.to_string();
        let page_no = page_no.to_string();
        let num_of_rows = self.page_size.to_string();

        log::trace!("GET {} LAWD_CD={region_code} DEAL_YMD={deal_ymd} pageNo={page_no}", self.url);

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("LAWD_CD", region_code),
                ("DEAL_YMD", deal_ymd.as_str()),
                ("pageNo", page_no.as_str()),
                ("numOfRows", num_of_rows.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}
