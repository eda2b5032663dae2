// src/utils/http.rs

//! HTTP client utilities.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
///
/// The client keeps cookies between requests so that a video page visit
/// authorises the following payload download. A configured `ms_token` is
/// seeded into the jar for the platform origin.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let origin = Url::parse(&config.base_url)?;
    let jar = Arc::new(Jar::default());
    if let Some(token) = config.ms_token.as_deref().filter(|t| !t.is_empty()) {
        let domain = origin
            .host_str()
            .ok_or_else(|| AppError::config("crawler.base_url has no host"))?;
        jar.add_cookie_str(&format!("msToken={token}; Domain={domain}; Path=/"), &origin);
    }

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(default_headers())
        .cookie_provider(jar)
        .build()?;
    Ok(client)
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-CA,en-US;q=0.7,en;q=0.3"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}
