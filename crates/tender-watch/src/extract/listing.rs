//! Tender listing page (HTML), used when the open-data feed is unavailable.
//!
//! Each tender is one `<tr class="list_tpl">`. Cells are positional:
//! `[0]` row number, `[1]` case number, `[2]` title, `[3]` organization,
//! `[4]` locality, `[5]` budget. The listing never shows why a tender
//! failed, so every row gets a fixed reason.

use super::{ExtractError, Extraction, Extractor};
use crate::types::RawRecord;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// CSS selector for one tender row.
pub const ROW_MARKER: &str = "tr.list_tpl";

/// Reason attached to listing rows.
pub const LISTING_FAIL_REASON: &str = "投標廠商不足三家";

/// Rows with fewer cells are headers or layout rows.
const MIN_COLUMNS: usize = 6;

/// Parses the tender listing page.
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    row_marker: String,
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingExtractor {
    pub fn new() -> Self {
        Self {
            row_marker: ROW_MARKER.to_string(),
        }
    }

    /// Use a different row selector.
    pub fn with_row_marker(marker: &str) -> Self {
        Self {
            row_marker: marker.to_string(),
        }
    }
}

impl Extractor for ListingExtractor {
    fn name(&self) -> &'static str {
        "listing"
    }

    fn extract(&self, payload: &[u8]) -> Result<Extraction, ExtractError> {
        let html = String::from_utf8_lossy(payload);
        let document = Html::parse_document(&html);
        let rows = Selector::parse(&self.row_marker)
            .map_err(|e| ExtractError::Parse(format!("bad row selector: {e}")))?;
        let cells = Selector::parse("td")
            .map_err(|e| ExtractError::Parse(format!("bad cell selector: {e}")))?;

        let mut out = Extraction::default();
        for row in document.select(&rows) {
            out.seen += 1;
            let cols: Vec<String> = row.select(&cells).map(|td| element_text(&td)).collect();
            if cols.len() < MIN_COLUMNS {
                out.skipped += 1;
                debug!(columns = cols.len(), "skipping short listing row");
                continue;
            }
            out.records.push(RawRecord {
                case_id: cols[1].clone(),
                title: cols[2].clone(),
                org_name: cols[3].clone(),
                org_address: cols[4].clone(),
                budget_text: cols[5].clone(),
                fail_reason: LISTING_FAIL_REASON.to_string(),
                failed: true,
            });
        }

        if out.seen == 0 {
            return Err(ExtractError::NoRows {
                marker: self.row_marker.clone(),
            });
        }
        Ok(out)
    }
}

/// Visible text of an element, whitespace-collapsed.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str) -> Vec<u8> {
        format!(
            "<html><body><table class=\"table_T01\">\
             <tr><th>項次</th><th>案號</th><th>名稱</th><th>機關</th><th>縣市</th><th>預算</th></tr>\
             {rows}</table></body></html>"
        )
        .into_bytes()
    }

    #[test]
    fn test_extracts_rows_positionally() {
        let payload = page(
            "<tr class=\"list_tpl\"><td>1</td><td>A1130001</td>\
             <td><a href=\"#\">道路\n  養護工程</a></td><td>新北市政府</td>\
             <td>[新北市]</td><td>1,200,000</td></tr>",
        );
        let out = ListingExtractor::new().extract(&payload).unwrap();
        assert_eq!(out.records.len(), 1);
        let r = &out.records[0];
        assert_eq!(r.case_id, "A1130001");
        assert_eq!(r.title, "道路 養護工程");
        assert_eq!(r.org_name, "新北市政府");
        assert_eq!(r.org_address, "[新北市]");
        assert_eq!(r.budget_text, "1,200,000");
        assert_eq!(r.fail_reason, LISTING_FAIL_REASON);
        assert!(r.is_failed_tender());
    }

    #[test]
    fn test_short_rows_skipped() {
        let payload = page(
            "<tr class=\"list_tpl\"><td>1</td><td>A1</td><td>t</td></tr>\
             <tr class=\"list_tpl\"><td>2</td><td>A2</td><td>t</td><td>o</td><td>桃園市</td><td>5</td></tr>",
        );
        let out = ListingExtractor::new().extract(&payload).unwrap();
        assert_eq!(out.seen, 2);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].case_id, "A2");
    }

    #[test]
    fn test_no_rows_is_reported() {
        let payload = page("<tr class=\"other\"><td>1</td></tr>");
        let err = ListingExtractor::new().extract(&payload).unwrap_err();
        assert_eq!(
            err,
            ExtractError::NoRows {
                marker: ROW_MARKER.to_string()
            }
        );
    }

    #[test]
    fn test_custom_marker() {
        let payload = page(
            "<tr class=\"row\"><td>1</td><td>B9</td><td>t</td><td>o</td><td>基隆市</td><td>7</td></tr>",
        );
        let out = ListingExtractor::with_row_marker("tr.row")
            .extract(&payload)
            .unwrap();
        assert_eq!(out.records[0].case_id, "B9");
    }

    #[test]
    fn test_bad_selector() {
        let err = ListingExtractor::with_row_marker("tr[[")
            .extract(b"<html></html>")
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
