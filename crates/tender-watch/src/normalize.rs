//! Turn raw extracted records into [`Notice`]s.

use crate::region::RegionClassifier;
use crate::types::{Notice, RawRecord};

/// Reason used when a failed tender does not state one.
pub const DEFAULT_FAIL_REASON: &str = "無法決標";

/// Parse a published budget string into whole currency units.
///
/// Everything except decimal digits and the decimal point is discarded
/// (thousands separators, currency labels, spaces). Full-width digits are
/// accepted. Anything that still does not parse yields `0`.
pub fn clean_budget(text: &str) -> u64 {
    let cleaned: String = text
        .chars()
        .filter_map(|c| match c {
            '0'..='9' | '.' => Some(c),
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32),
            '．' => Some('.'),
            _ => None,
        })
        .collect();

    if cleaned.is_empty() {
        return 0;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v.trunc() as u64,
        _ => 0,
    }
}

/// Collapse internal whitespace runs and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds notices from failed-tender candidates.
#[derive(Debug, Clone, Default)]
pub struct RecordNormalizer {
    classifier: RegionClassifier,
}

impl RecordNormalizer {
    pub fn new(classifier: RegionClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &RegionClassifier {
        &self.classifier
    }

    /// Convert a candidate into a notice.
    ///
    /// Returns `None` when the organization address names no known region;
    /// such records are out of scope and dropped silently.
    pub fn to_notice(&self, raw: &RawRecord) -> Option<Notice> {
        let city = self.classifier.classify(&raw.org_address)?;
        let reason = clean_text(&raw.fail_reason);
        Some(Notice {
            id: clean_text(&raw.case_id),
            title: clean_text(&raw.title),
            org: clean_text(&raw.org_name),
            city: city.to_string(),
            budget: clean_budget(&raw.budget_text),
            reason: if reason.is_empty() {
                DEFAULT_FAIL_REASON.to_string()
            } else {
                reason
            },
        })
    }
}
