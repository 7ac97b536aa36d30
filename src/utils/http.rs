// src/utils/http.rs

//! HTTP client utilities.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::CookieStore;

use crate::error::Result;
use crate::models::PortalConfig;

/// Create a client that reads and writes cookies through `store`.
///
/// Every request carries the portal timeout; redirects are followed.
pub fn create_session_client<C>(config: &PortalConfig, store: Arc<C>) -> Result<reqwest::Client>
where
    C: CookieStore + 'static,
{
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .cookie_provider(store)
        .build()?;
    Ok(client)
}

/// Media type of a response, lowercased, without parameters.
pub fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
}

/// Whether a media type is (or may be) an HTML page.
pub fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) => ct == "text/html" || ct == "application/xhtml+xml",
        None => true,
    }
}
