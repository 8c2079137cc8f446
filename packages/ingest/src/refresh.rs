//! Post-run cache refresh call.

use std::time::Duration;

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

const REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Asks the serving API to reload after new data landed.
///
/// Does nothing (beyond a log line) when `url` is `None`.
///
/// # Errors
///
/// Returns [`reqwest::Error`] if the request fails or the API answers with
/// a non-2xx status.
pub async fn refresh_api(url: Option<&str>, admin_token: Option<&str>) -> Result<(), reqwest::Error> {
    let Some(url) = url else {
        log::info!("API_REFRESH_URL not set, skipping refresh");
        return Ok(());
    };

    let client = reqwest::Client::builder().timeout(REFRESH_TIMEOUT).build()?;
    let mut request = client.get(url);
    if let Some(token) = admin_token {
        request = request.header(ADMIN_TOKEN_HEADER, token);
    }

    log::info!("Refreshing API: GET {url}");
    let response = request.send().await?;
    let status = response.status();
    response.error_for_status_ref()?;

    let body = response.text().await.unwrap_or_default();
    log::info!(
        "Refresh status={status} body={}",
        body.chars().take(300).collect::<String>()
    );

    Ok(())
}
