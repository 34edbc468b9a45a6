//! One monitoring run: periods → fetch → extract → filter → dispatch.
//!
//! Every period is handled on its own. Nothing that goes wrong inside a
//! period (missing file, HTTP failure, broken payload, webhook errors) stops
//! the run; it is recorded in the [`RunResult`] and the next period starts.

use crate::config::MonitorConfig;
use crate::dispatch::{DispatchTally, Dispatcher};
use crate::extract::{ExtractError, Extractor, ListingExtractor, StructuredExtractor};
use crate::fetch::{build_client, FeedFetcher, FetchOutcome};
use crate::normalize::RecordNormalizer;
use crate::period::{recent_periods, taipei_today, Period};
use crate::region::RegionClassifier;
use crate::types::{Notice, RawRecord};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// How a period ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    /// The award file was downloaded and parsed.
    Processed,
    /// The award file is not out yet.
    NotPublished,
    /// The award file could not be downloaded and no fallback ran.
    FetchFailed,
    /// The award file was not a readable document.
    ParseFailed,
    /// The feed failed; records came from the listing page instead.
    ListingFallback,
    /// The listing page had no tender rows.
    ListingNoRows,
}

/// Outcome of one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodReport {
    pub period: Period,
    pub status: PeriodStatus,
    pub candidates: usize,
    pub northern: usize,
    pub unmapped: usize,
    pub dispatched: usize,
    pub failed: usize,
    /// Error text for failed periods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PeriodReport {
    fn empty(period: Period, status: PeriodStatus, detail: Option<String>) -> Self {
        Self {
            period,
            status,
            candidates: 0,
            northern: 0,
            unmapped: 0,
            dispatched: 0,
            failed: 0,
            detail,
        }
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub periods_processed: usize,
    /// Failed-tender candidates found, before region filtering.
    pub candidates: usize,
    /// Candidates located in a northern region.
    pub northern: usize,
    /// Candidates whose address matched no known region.
    pub unmapped: usize,
    pub dispatched: usize,
    pub failed: usize,
    pub rejected: usize,
    pub transport_errors: usize,
    pub periods: Vec<PeriodReport>,
}

impl RunResult {
    fn add(&mut self, report: PeriodReport, tally: DispatchTally) {
        self.periods_processed += 1;
        self.candidates += report.candidates;
        self.northern += report.northern;
        self.unmapped += report.unmapped;
        self.dispatched += tally.accepted;
        self.failed += tally.failed();
        self.rejected += tally.rejected;
        self.transport_errors += tally.transport_errors;
        self.periods.push(report);
    }

    /// Periods that ended in an error state.
    pub fn failed_periods(&self) -> impl Iterator<Item = &PeriodReport> {
        self.periods.iter().filter(|p| {
            matches!(
                p.status,
                PeriodStatus::FetchFailed | PeriodStatus::ParseFailed | PeriodStatus::ListingNoRows
            )
        })
    }
}

/// Runs the monitor end to end.
pub struct Pipeline {
    fetcher: FeedFetcher,
    normalizer: RecordNormalizer,
    dispatcher: Dispatcher,
    recent_periods: usize,
    listing_fallback: bool,
}

impl Pipeline {
    /// Build a pipeline with one shared HTTP client.
    pub fn new(config: &MonitorConfig) -> Result<Self, reqwest::Error> {
        let client = build_client()?;
        let fetcher = FeedFetcher::new(client.clone(), config.portal.clone());
        let dispatcher = Dispatcher::new(client, config.webhook_url.clone());
        Ok(Self::from_parts(fetcher, dispatcher, config))
    }

    /// Assemble a pipeline from prepared components.
    pub fn from_parts(fetcher: FeedFetcher, dispatcher: Dispatcher, config: &MonitorConfig) -> Self {
        Self {
            fetcher,
            normalizer: RecordNormalizer::new(RegionClassifier::new()),
            dispatcher,
            recent_periods: config.recent_periods,
            listing_fallback: config.listing_fallback,
        }
    }

    /// Run against today's date in Taiwan.
    pub async fn run(&self) -> RunResult {
        self.run_for(taipei_today()).await
    }

    /// Run against a given reference date.
    pub async fn run_for(&self, reference: NaiveDate) -> RunResult {
        let periods = recent_periods(reference, self.recent_periods);
        let names: Vec<String> = periods.iter().map(|p| p.to_string()).collect();
        info!(reference = %reference, periods = ?names, "starting run");

        let mut result = RunResult::default();
        let mut listing_used = false;
        for period in periods {
            let (report, tally) = self.process_period(period, &mut listing_used).await;
            info!(
                %period,
                status = ?report.status,
                candidates = report.candidates,
                northern = report.northern,
                dispatched = report.dispatched,
                failed = report.failed,
                "period finished"
            );
            result.add(report, tally);
        }

        info!(
            periods = result.periods_processed,
            candidates = result.candidates,
            northern = result.northern,
            dispatched = result.dispatched,
            failed = result.failed,
            "run complete"
        );
        result
    }

    async fn process_period(
        &self,
        period: Period,
        listing_used: &mut bool,
    ) -> (PeriodReport, DispatchTally) {
        let fetch_err = match self.fetcher.fetch_period(period).await {
            Ok(FetchOutcome::Payload(body)) => {
                return self
                    .process_payload(period, &StructuredExtractor, &body, PeriodStatus::Processed)
                    .await;
            }
            Ok(FetchOutcome::NotPublished { bytes }) => {
                info!(%period, bytes, "award file not published yet");
                return (
                    PeriodReport::empty(period, PeriodStatus::NotPublished, None),
                    DispatchTally::default(),
                );
            }
            Err(e) => e,
        };

        error!(%period, status = ?fetch_err.status(), error = %fetch_err, "award file download failed");
        if !self.listing_fallback || *listing_used {
            return (
                PeriodReport::empty(period, PeriodStatus::FetchFailed, Some(fetch_err.to_string())),
                DispatchTally::default(),
            );
        }

        // The listing is not tied to a period; read it at most once per run.
        *listing_used = true;
        info!(%period, "falling back to the tender listing page");
        match self.fetcher.fetch_listing().await {
            Ok(body) => {
                self.process_payload(
                    period,
                    &ListingExtractor::new(),
                    &body,
                    PeriodStatus::ListingFallback,
                )
                .await
            }
            Err(e) => {
                error!(%period, error = %e, "listing download failed");
                let detail = format!("{fetch_err}; listing: {e}");
                (
                    PeriodReport::empty(period, PeriodStatus::FetchFailed, Some(detail)),
                    DispatchTally::default(),
                )
            }
        }
    }

    async fn process_payload(
        &self,
        period: Period,
        extractor: &dyn Extractor,
        payload: &[u8],
        status: PeriodStatus,
    ) -> (PeriodReport, DispatchTally) {
        let extraction = match extractor.extract(payload) {
            Ok(extraction) => extraction,
            Err(e @ ExtractError::NoRows { .. }) => {
                error!(%period, extractor = extractor.name(), error = %e, "no tender rows found, possible selector drift");
                return (
                    PeriodReport::empty(period, PeriodStatus::ListingNoRows, Some(e.to_string())),
                    DispatchTally::default(),
                );
            }
            Err(e) => {
                error!(%period, extractor = extractor.name(), error = %e, "payload could not be parsed");
                return (
                    PeriodReport::empty(period, PeriodStatus::ParseFailed, Some(e.to_string())),
                    DispatchTally::default(),
                );
            }
        };
        if extraction.skipped > 0 {
            warn!(%period, skipped = extraction.skipped, seen = extraction.seen, "some records were skipped");
        }

        let (northern, unmapped) = self.select_northern(period, &extraction.records);
        info!(
            %period,
            extractor = extractor.name(),
            candidates = extraction.records.len(),
            northern = northern.len(),
            "failed tenders extracted"
        );

        let tally = self.dispatcher.dispatch_all(&northern).await;
        let report = PeriodReport {
            period,
            status,
            candidates: extraction.records.len(),
            northern: northern.len(),
            unmapped,
            dispatched: tally.accepted,
            failed: tally.failed(),
            detail: None,
        };
        (report, tally)
    }

    /// Normalize candidates and keep those in the northern regions.
    /// Also returns how many matched no region at all.
    fn select_northern(&self, period: Period, records: &[RawRecord]) -> (Vec<Notice>, usize) {
        let classifier = self.normalizer.classifier();
        let mut northern = Vec::new();
        let mut unmapped = 0;
        for raw in records {
            match self.normalizer.to_notice(raw) {
                Some(notice) if classifier.is_northern(&notice.city) => northern.push(notice),
                Some(_) => {}
                None => {
                    unmapped += 1;
                    debug!(%period, case_id = %raw.case_id, address = %raw.org_address, "no region in address, dropping");
                }
            }
        }
        (northern, unmapped)
    }
}
