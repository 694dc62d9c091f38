//! Static HTTP fetch
//!
//! One GET per target with a browser-like user agent and a bounded timeout.
//! Retries are the caller's business.

use super::FetchFailure;
use crate::config::FetcherConfig;
use reqwest::Client;
use std::time::Duration;

/// Builds the HTTP client used for static fetches
///
/// # Example
///
/// ```no_run
/// use press_sieve::config::FetcherConfig;
/// use press_sieve::fetcher::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page body with a single GET
///
/// Returns the final URL (after redirects) and the decoded body. Non-2xx
/// statuses and transport errors become [`FetchFailure`]s.
pub async fn fetch_static(client: &Client, url: &str) -> Result<(String, String), FetchFailure> {
    let response = client.get(url).send().await.map_err(|e| classify_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchFailure::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().to_string();
    let body = response.text().await.map_err(|e| FetchFailure::Body {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    Ok((final_url, body))
}

fn classify_error(url: &str, e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchFailure::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}
