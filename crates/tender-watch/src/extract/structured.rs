//! Open-data award feed (XML).
//!
//! The feed is a flat list of `<record>` elements, each holding one child
//! element per field:
//!
//! ```xml
//! <record>
//!   <tender_case_no>A1130001</tender_case_no>
//!   <tender_name>道路養護工程</tender_name>
//!   <org_name>新北市政府工務局</org_name>
//!   <org_address>新北市板橋區中山路一段161號</org_address>
//!   <budget_amount>1,200,000</budget_amount>
//!   <fail_reason>無廠商投標</fail_reason>
//!   <is_failed>Y</is_failed>
//! </record>
//! ```
//!
//! A record with broken content (nested markup inside a field, bad entity)
//! is skipped on its own. A document that is not well-formed is rejected
//! as a whole.

use super::{ExtractError, Extraction, Extractor};
use crate::types::RawRecord;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

pub const RECORD_TAG: &str = "record";

/// Parses the award XML feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for StructuredExtractor {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn extract(&self, payload: &[u8]) -> Result<Extraction, ExtractError> {
        let mut reader = Reader::from_reader(payload);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        let mut out = Extraction::default();
        let mut current: Option<RecordBuilder> = None;
        let mut saw_element = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    saw_element = true;
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    if let Some(rec) = current.as_mut() {
                        rec.open(name);
                    } else if name == RECORD_TAG {
                        current = Some(RecordBuilder::default());
                    }
                }
                Ok(Event::Empty(e)) => {
                    saw_element = true;
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    if let Some(rec) = current.as_mut() {
                        rec.open(name);
                        rec.close();
                    } else if name == RECORD_TAG {
                        finish_record(RecordBuilder::default(), &mut out);
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(rec) = current.as_mut() {
                        match e.unescape() {
                            Ok(text) => rec.push_text(&text),
                            Err(err) => rec.mark_broken(format!("bad text: {err}")),
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(rec) = current.as_mut() {
                        rec.push_text(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::End(_)) => {
                    let record_closed = match current.as_mut() {
                        Some(rec) => rec.close(),
                        None => false,
                    };
                    if record_closed {
                        if let Some(rec) = current.take() {
                            finish_record(rec, &mut out);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ExtractError::Parse(format!(
                        "at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
                _ => {}
            }
            buf.clear();
        }

        if current.is_some() {
            return Err(ExtractError::Parse(format!(
                "document ends inside <{RECORD_TAG}>"
            )));
        }
        if !saw_element {
            return Err(ExtractError::Parse("no XML elements found".to_string()));
        }
        Ok(out)
    }
}

fn finish_record(rec: RecordBuilder, out: &mut Extraction) {
    out.seen += 1;
    match rec.build() {
        Ok(raw) => {
            if raw.is_failed_tender() {
                out.records.push(raw);
            }
        }
        Err(reason) => {
            out.skipped += 1;
            warn!(record = out.seen, reason = %reason, "skipping unreadable record");
        }
    }
}

/// Accumulates the fields of one `<record>` while it is being read.
#[derive(Debug, Default)]
struct RecordBuilder {
    /// Element depth below `<record>`; 1 means inside a field element.
    depth: usize,
    field: Option<String>,
    text: String,
    fields: Vec<(String, String)>,
    broken: Option<String>,
}

impl RecordBuilder {
    fn open(&mut self, name: String) {
        self.depth += 1;
        if self.depth == 1 {
            self.field = Some(name);
            self.text.clear();
        } else {
            let parent = self.field.as_deref().unwrap_or("?");
            let reason = format!("unexpected <{name}> inside <{parent}>");
            self.mark_broken(reason);
        }
    }

    /// Close the innermost element. Returns true when that was `<record>`.
    fn close(&mut self) -> bool {
        match self.depth {
            0 => true,
            1 => {
                if let Some(name) = self.field.take() {
                    let value = self.text.trim().to_string();
                    self.fields.push((name, value));
                }
                self.text.clear();
                self.depth = 0;
                false
            }
            _ => {
                self.depth -= 1;
                false
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.depth == 1 {
            self.text.push_str(text);
        }
    }

    fn mark_broken(&mut self, reason: String) {
        if self.broken.is_none() {
            self.broken = Some(reason);
        }
    }

    /// First occurrence wins.
    fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn build(self) -> Result<RawRecord, String> {
        if let Some(reason) = &self.broken {
            return Err(reason.clone());
        }
        let text = |name: &str| self.get(name).unwrap_or_default().to_string();
        let budget = match self.get("budget_amount") {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => "0".to_string(),
        };
        Ok(RawRecord {
            case_id: text("tender_case_no"),
            title: text("tender_name"),
            org_name: text("org_name"),
            org_address: text("org_address"),
            budget_text: budget,
            fail_reason: text("fail_reason"),
            failed: self
                .get("is_failed")
                .is_some_and(|v| v.eq_ignore_ascii_case("Y")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, address: &str, reason: &str, flag: &str) -> String {
        format!(
            "<record><tender_case_no>{id}</tender_case_no><tender_name>案件{id}</tender_name>\
             <org_name>機關</org_name><org_address>{address}</org_address>\
             <budget_amount>1,000</budget_amount><fail_reason>{reason}</fail_reason>\
             <is_failed>{flag}</is_failed></record>"
        )
    }

    fn doc(records: &[String]) -> Vec<u8> {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><records>{}</records>",
            records.concat()
        )
        .into_bytes()
    }

    #[test]
    fn test_extracts_fields() {
        let payload = doc(&[record("A1", " 新北市板橋區 ", "無廠商投標", "N")]);
        let out = StructuredExtractor.extract(&payload).unwrap();
        assert_eq!(out.seen, 1);
        assert_eq!(out.records.len(), 1);
        let r = &out.records[0];
        assert_eq!(r.case_id, "A1");
        assert_eq!(r.title, "案件A1");
        assert_eq!(r.org_address, "新北市板橋區");
        assert_eq!(r.budget_text, "1,000");
        assert_eq!(r.fail_reason, "無廠商投標");
        assert!(!r.failed);
    }

    #[test]
    fn test_candidate_detection() {
        let payload = doc(&[
            record("A1", "臺北市", "", "N"),
            record("A2", "臺北市", "", "Y"),
            record("A3", "臺北市", "廢標", "N"),
        ]);
        let out = StructuredExtractor.extract(&payload).unwrap();
        assert_eq!(out.seen, 3);
        let ids: Vec<&str> = out.records.iter().map(|r| r.case_id.as_str()).collect();
        assert_eq!(ids, vec!["A2", "A3"]);
    }

    #[test]
    fn test_missing_fields_default() {
        let payload = doc(&["<record><tender_name>x</tender_name><is_failed>Y</is_failed></record>"
            .to_string()]);
        let out = StructuredExtractor.extract(&payload).unwrap();
        let r = &out.records[0];
        assert_eq!(r.case_id, "");
        assert_eq!(r.budget_text, "0");
        assert_eq!(r.fail_reason, "");
        assert!(r.failed);
    }

    #[test]
    fn test_empty_field_elements() {
        let payload = doc(&["<record><tender_case_no/><fail_reason>流標</fail_reason></record>"
            .to_string()]);
        let out = StructuredExtractor.extract(&payload).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].case_id, "");
    }

    #[test]
    fn test_entities_and_cdata() {
        let payload = doc(&["<record><tender_name>A &amp; B</tender_name>\
             <fail_reason><![CDATA[<無>廠商]]></fail_reason></record>"
            .to_string()]);
        let out = StructuredExtractor.extract(&payload).unwrap();
        assert_eq!(out.records[0].title, "A & B");
        assert_eq!(out.records[0].fail_reason, "<無>廠商");
    }

    #[test]
    fn test_broken_record_is_skipped_alone() {
        let payload = doc(&[
            record("A1", "新北市", "流標", "Y"),
            "<record><tender_case_no>A2</tender_case_no>\
             <org_address><city>新北市</city></org_address>\
             <fail_reason>流標</fail_reason></record>"
                .to_string(),
            "<record><tender_name>bad &nosuch; entity</tender_name>\
             <is_failed>Y</is_failed></record>"
                .to_string(),
            record("A4", "桃園市", "流標", "Y"),
        ]);
        let out = StructuredExtractor.extract(&payload).unwrap();
        assert_eq!(out.seen, 4);
        assert_eq!(out.skipped, 2);
        let ids: Vec<&str> = out.records.iter().map(|r| r.case_id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A4"]);
    }

    #[test]
    fn test_records_at_any_depth() {
        let payload = b"<root><batch><record><tender_case_no>Z</tender_case_no>\
            <is_failed>Y</is_failed></record></batch></root>";
        let out = StructuredExtractor.extract(payload).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].case_id, "Z");
    }

    #[test]
    fn test_malformed_document() {
        let err = StructuredExtractor
            .extract(b"<records><record><tender_name>x</tender_name></records>")
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));

        let err = StructuredExtractor
            .extract(b"<records><record><tender_name>x</tender_name>")
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));

        let err = StructuredExtractor.extract(b"plain text, not xml").unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[test]
    fn test_document_without_records() {
        let out = StructuredExtractor.extract(b"<records></records>").unwrap();
        assert_eq!(out, Extraction::default());
    }

    /// The parser must never panic, whatever it is fed.
    #[test]
    fn test_fuzz_inputs() {
        let inputs: [&[u8]; 9] = [
            b"",
            b"<",
            b"<<<>>>",
            b"<record>",
            b"<record></record>",
            b"<record/>",
            b"\x00\x01\x02",
            b"<records><record><is_failed>Y</is_failed></record>",
            b"<?xml version=\"1.0\"?>",
        ];
        for input in inputs {
            let _ = StructuredExtractor.extract(input);
        }
    }
}
