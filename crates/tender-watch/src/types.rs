//! Record types shared by the extractors, the normalizer and the dispatcher.

use serde::{Deserialize, Serialize};

/// A tender record as pulled out of a source payload, before any cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// Case number on the portal. May be empty.
    pub case_id: String,
    pub title: String,
    /// Name of the procuring organization.
    pub org_name: String,
    /// Address or locality text of the organization.
    pub org_address: String,
    /// Budget exactly as published, e.g. `"1,234,000"`.
    pub budget_text: String,
    /// Reason the tender could not be awarded. Empty when not given.
    pub fail_reason: String,
    /// Explicit "failed" flag from the feed.
    pub failed: bool,
}

impl RawRecord {
    /// A record is a failed-tender candidate when it carries a failure
    /// reason or is explicitly flagged as failed.
    pub fn is_failed_tender(&self) -> bool {
        !self.fail_reason.is_empty() || self.failed
    }
}

/// A cleaned failed-tender notice, as posted to the webhook.
///
/// Serialises to `{id, title, org, city, budget, reason}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub org: String,
    /// Canonical region name, always one of the classifier's known regions.
    pub city: String,
    pub budget: u64,
    pub reason: String,
}
