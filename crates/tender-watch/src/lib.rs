//! tender-watch — failed-tender monitor for the government e-procurement portal.
//!
//! Downloads the half-monthly award feed (or, when that is unavailable, the
//! tender listing page), keeps tenders that could not be awarded in the
//! northern regions, and posts each one to a webhook.

pub mod config;
pub mod dispatch;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod period;
pub mod pipeline;
pub mod rate_limit;
pub mod region;
pub mod types;

pub use config::{ConfigError, MonitorConfig, PortalEndpoints};
pub use dispatch::{DispatchOutcome, DispatchTally, Dispatcher};
pub use extract::{ExtractError, Extraction, Extractor, ListingExtractor, StructuredExtractor};
pub use fetch::{FeedFetcher, FetchError, FetchOutcome, RetryPolicy};
pub use normalize::{clean_budget, RecordNormalizer};
pub use period::{current_period, recent_periods, Period};
pub use pipeline::{PeriodReport, PeriodStatus, Pipeline, RunResult};
pub use rate_limit::{IntervalLimiter, RateLimiter, Unlimited};
pub use region::RegionClassifier;
pub use types::{Notice, RawRecord};
