//! Record extraction from the two portal formats.
//!
//! The open-data feed is XML ([`StructuredExtractor`]); the listing page is
//! HTML ([`ListingExtractor`]). Both produce failed-tender candidates as
//! [`RawRecord`]s so the rest of the pipeline does not care which one ran.

pub mod listing;
pub mod structured;

pub use listing::ListingExtractor;
pub use structured::StructuredExtractor;

use crate::types::RawRecord;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The payload as a whole is not a readable document.
    #[error("malformed document: {0}")]
    Parse(String),

    /// The page parsed but no tender rows matched. Usually means the portal
    /// changed its markup.
    #[error("no rows matched '{marker}' (page layout may have changed)")]
    NoRows { marker: String },
}

/// Candidates pulled from one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Failed-tender candidates, in document order.
    pub records: Vec<RawRecord>,
    /// Records seen in the payload, candidate or not.
    pub seen: usize,
    /// Records that could not be read and were skipped.
    pub skipped: usize,
}

/// Turns a downloaded payload into failed-tender candidates.
pub trait Extractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn extract(&self, payload: &[u8]) -> Result<Extraction, ExtractError>;
}
