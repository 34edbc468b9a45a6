//! HTTP retrieval from the procurement portal.
//!
//! One shared `reqwest::Client` with a browser user agent and a cookie
//! store. Every GET is retried with exponential backoff on 5xx gateway
//! errors and on connect/timeout failures.

use crate::config::{PortalEndpoints, FETCH_TIMEOUT};
use crate::period::Period;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/120.0.0.0 Safari/537.36";

/// Bodies shorter than this mean the period file is not out yet.
pub const MIN_PUBLISHED_BYTES: usize = 100;

/// Statuses worth another attempt.
const RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Build the client shared by the fetcher and the dispatcher.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/xml,text/xml,*/*;q=0.9"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
    );

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(FETCH_TIMEOUT)
        .build()
}

/// How often and how patiently a GET is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no waiting between attempts.
    pub fn without_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    fn retries_status(status: u16) -> bool {
        RETRY_STATUSES.contains(&status)
    }

    fn retries_transport(err: &reqwest::Error) -> bool {
        err.is_connect() || err.is_timeout()
    }
}

/// Result of asking for a period's award file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Payload(Vec<u8>),
    /// The portal answered, but with a body too small to be a real file.
    NotPublished { bytes: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Transport { .. } => None,
        }
    }
}

/// Retrieves feed files and listing pages from the portal.
#[derive(Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    portal: PortalEndpoints,
    retry: RetryPolicy,
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client, portal: PortalEndpoints) -> Self {
        Self {
            client,
            portal,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn portal(&self) -> &PortalEndpoints {
        &self.portal
    }

    /// Download the award file for `period`.
    pub async fn fetch_period(&self, period: Period) -> Result<FetchOutcome, FetchError> {
        let file_name = period.award_file_name();
        let url = format!("{}?fileName={}", self.portal.feed_url, file_name);
        info!(%period, url = %url, "downloading award file");

        let request = self
            .client
            .get(&self.portal.feed_url)
            .query(&[("fileName", file_name.as_str())]);
        let body = self.send_with_retry(request, &url).await?;

        if body.len() < MIN_PUBLISHED_BYTES {
            return Ok(FetchOutcome::NotPublished { bytes: body.len() });
        }
        debug!(%period, bytes = body.len(), "award file downloaded");
        Ok(FetchOutcome::Payload(body))
    }

    /// Fetch the tender listing page.
    ///
    /// The portal serves an empty listing to clients without a session, so
    /// the home page is visited first (the cookie store keeps the session)
    /// and the listing is requested with the home page as referrer.
    pub async fn fetch_listing(&self) -> Result<Vec<u8>, FetchError> {
        let home = &self.portal.home_url;
        info!(url = %home, "opening portal session");
        self.send_with_retry(self.client.get(home), home).await?;

        let listing = &self.portal.listing_url;
        info!(url = %listing, "downloading tender listing");
        let request = self.client.get(listing).header(REFERER, home.as_str());
        self.send_with_retry(request, listing).await
    }

    async fn send_with_retry(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let can_retry = attempt < self.retry.max_attempts;
            // Builders with a plain body always clone.
            let Some(this_try) = request.try_clone() else {
                return self.finish(request.send().await, url).await;
            };

            match this_try.send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if RetryPolicy::retries_status(status) && can_retry {
                        let delay = self.retry.backoff(attempt);
                        warn!(url, status, attempt, ?delay, "server error, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return self.finish(Ok(resp), url).await;
                }
                Err(e) => {
                    if RetryPolicy::retries_transport(&e) && can_retry {
                        let delay = self.retry.backoff(attempt);
                        warn!(url, attempt, ?delay, error = %e, "connection failed, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(FetchError::Transport {
                        url: url.to_string(),
                        source: e,
                    });
                }
            }
        }
    }

    async fn finish(
        &self,
        resp: Result<reqwest::Response, reqwest::Error>,
        url: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };
        let resp = resp.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds() {
        assert!(build_client().is_ok());
    }

    #[test]
    fn test_default_policy() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.backoff(1), Duration::from_secs(1));
        assert_eq!(p.backoff(2), Duration::from_secs(2));
        assert_eq!(p.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_without_backoff() {
        let p = RetryPolicy::without_backoff(3);
        assert_eq!(p.backoff(2), Duration::ZERO);
    }

    #[test]
    fn test_retry_statuses() {
        for s in [500, 502, 503, 504] {
            assert!(RetryPolicy::retries_status(s));
        }
        for s in [200, 400, 404, 429, 501] {
            assert!(!RetryPolicy::retries_status(s));
        }
    }

    #[test]
    fn test_fetch_error_status() {
        let e = FetchError::Status {
            status: 503,
            url: "http://x".to_string(),
        };
        assert_eq!(e.status(), Some(503));
        assert_eq!(e.to_string(), "http://x returned HTTP 503");
    }
}
