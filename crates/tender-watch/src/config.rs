//! Run configuration.
//!
//! The webhook URL is the only externally supplied value. Portal endpoints,
//! retry policy, delays and timeouts are constants.

use std::time::Duration;
use url::Url;

/// Environment variable holding the webhook URL.
pub const WEBHOOK_URL_ENV: &str = "GAS_URL";

pub const FEED_DOWNLOAD_URL: &str = "https://web.pcc.gov.tw/tps/tp/OpenData/downloadFile";
pub const PORTAL_HOME_URL: &str = "https://web.pcc.gov.tw/";
pub const LISTING_URL: &str =
    "https://web.pcc.gov.tw/prkms/tender/common/noticeAll/readNoticeAll?searchType=basic";

/// Number of recent periods scanned per run.
pub const RECENT_PERIOD_COUNT: usize = 2;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum spacing between two webhook calls.
pub const DISPATCH_INTERVAL: Duration = Duration::from_millis(500);

/// Errors that make a run impossible. Checked before any network I/O.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("webhook URL is not set (expected GAS_URL or --gas-url)")]
    MissingWebhookUrl,

    #[error("webhook URL '{value}' is invalid: {source}")]
    InvalidWebhookUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Where the portal lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalEndpoints {
    /// Open-data download endpoint; takes a `fileName` query parameter.
    pub feed_url: String,
    /// Visited first to obtain a session cookie.
    pub home_url: String,
    /// Tender listing page used when the feed is unavailable.
    pub listing_url: String,
}

impl Default for PortalEndpoints {
    fn default() -> Self {
        Self {
            feed_url: FEED_DOWNLOAD_URL.to_string(),
            home_url: PORTAL_HOME_URL.to_string(),
            listing_url: LISTING_URL.to_string(),
        }
    }
}

impl PortalEndpoints {
    /// Endpoints rooted at `base` (no trailing slash), using the portal's
    /// real paths. Handy for pointing the monitor at a mock server.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            feed_url: format!("{base}/tps/tp/OpenData/downloadFile"),
            home_url: format!("{base}/"),
            listing_url: format!("{base}/prkms/tender/common/noticeAll/readNoticeAll?searchType=basic"),
        }
    }
}

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub webhook_url: Url,
    pub portal: PortalEndpoints,
    pub recent_periods: usize,
    /// Fall back to the HTML listing when the feed cannot be fetched.
    pub listing_fallback: bool,
}

impl MonitorConfig {
    /// Build a config from an explicit webhook URL.
    pub fn new(webhook_url: &str) -> Result<Self, ConfigError> {
        let trimmed = webhook_url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::MissingWebhookUrl);
        }
        let webhook_url = Url::parse(trimmed).map_err(|source| ConfigError::InvalidWebhookUrl {
            value: trimmed.to_string(),
            source,
        })?;
        Ok(Self {
            webhook_url,
            portal: PortalEndpoints::default(),
            recent_periods: RECENT_PERIOD_COUNT,
            listing_fallback: true,
        })
    }

    /// Resolve the webhook URL: explicit value first, then the environment.
    pub fn resolve(explicit: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(url) = explicit {
            return Self::new(url);
        }
        Self::from_env()
    }

    /// Read the webhook URL from `GAS_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let value = std::env::var(WEBHOOK_URL_ENV).map_err(|_| ConfigError::MissingWebhookUrl)?;
        Self::new(&value)
    }

    pub fn with_portal(mut self, portal: PortalEndpoints) -> Self {
        self.portal = portal;
        self
    }

    pub fn without_listing_fallback(mut self) -> Self {
        self.listing_fallback = false;
        self
    }
}
