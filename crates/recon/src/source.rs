//! Raw collaborator payloads (vision model output, web-service lookups) into
//! validated [`SourceRecord`]s.
//!
//! Payloads are loosely typed: numbers where strings are expected, author
//! lists instead of a single string, ISBNs under several keys or only inside
//! free text. Everything is flattened here so the reconciler only ever sees
//! typed records.

use serde_json::{Map, Value};

use crate::error::ReconError;
use crate::identifier::{find_isbns, normalize_isbn};
use crate::model::SourceRecord;

/// Scalar or list → text. Lists are joined with `", "`; nulls, objects and
/// blank strings yield `None`.
fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().filter_map(text).collect::<Vec<_>>().join(", "),
        _ => return None,
    };
    if s.is_empty() { None } else { Some(s) }
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(text))
}

/// First checksum-valid ISBN among the explicit keys; failing that, the first
/// raw value (the reconciler will discard it visibly); failing that, an ISBN
/// found in free text.
fn pick_isbn(obj: &Map<String, Value>) -> Option<String> {
    const KEYS: [&str; 5] = ["isbn13", "isbn_13", "isbn", "isbn10", "isbn_10"];

    let raw: Vec<String> = KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().filter_map(text).collect(),
            other => text(other).into_iter().collect::<Vec<_>>(),
        })
        .collect();

    if let Some(valid) = raw.iter().find(|r| normalize_isbn(r).is_some()) {
        return Some(valid.clone());
    }
    if let Some(first) = raw.into_iter().next() {
        return Some(first);
    }
    ["additional_text", "text"]
        .iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find_map(|t| find_isbns(t).into_iter().next())
}

/// Build a record for `source_id` from one payload object.
pub fn from_payload(source_id: &str, payload: &Value) -> Result<SourceRecord, ReconError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ReconError::invalid_source(source_id, "payload is not a JSON object"))?;

    let confidence = match obj.get("confidence") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| ReconError::invalid_source(source_id, "confidence is not a number"))?,
        ),
    };

    let record = SourceRecord {
        source_id: source_id.trim().to_string(),
        title: first_text(obj, &["title"]),
        author: first_text(obj, &["author", "authors"]),
        publisher: first_text(obj, &["publisher", "publishers"]),
        publication_year: first_text(
            obj,
            &["publication_year", "year", "published_date", "publish_date", "date"],
        ),
        isbn: pick_isbn(obj),
        oclc_number: first_text(obj, &["oclc_number", "oclc_no", "oclc"]),
        lccn: first_text(obj, &["lccn", "lc_no"]),
        confidence,
    };
    record.validate()?;
    Ok(record)
}

/// Parse a JSON array of payload objects, each naming its origin under
/// `source_id` (or `source`).
pub fn parse_sources_json(json: &str) -> Result<Vec<SourceRecord>, ReconError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ReconError::invalid_source("", format!("not valid JSON: {e}")))?;
    let items = value
        .as_array()
        .ok_or_else(|| ReconError::invalid_source("", "expected a JSON array of source payloads"))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let source_id = item
                .get("source_id")
                .or_else(|| item.get("source"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ReconError::invalid_source("", format!("payload #{i} has no source_id")))?;
            from_payload(source_id, item)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_loose_types() {
        let rec = from_payload(
            "openlibrary",
            &json!({
                "title": "  Dune ",
                "authors": ["Frank Herbert", "  "],
                "publishers": ["Chilton"],
                "publish_date": 1965,
                "oclc_no": "ocm00012345",
                "confidence": 0.8,
            }),
        )
        .unwrap();
        assert_eq!(rec.title.as_deref(), Some("Dune"));
        assert_eq!(rec.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(rec.publisher.as_deref(), Some("Chilton"));
        assert_eq!(rec.publication_year.as_deref(), Some("1965"));
        assert_eq!(rec.oclc_number.as_deref(), Some("ocm00012345"));
        assert_eq!(rec.confidence, Some(0.8));
    }

    #[test]
    fn joins_author_lists() {
        let rec = from_payload("googlebooks", &json!({"title": "Elements", "authors": ["Strunk", "White"]})).unwrap();
        assert_eq!(rec.author.as_deref(), Some("Strunk, White"));
    }

    #[test]
    fn prefers_valid_isbn_key() {
        let rec = from_payload(
            "googlebooks",
            &json!({"title": "x", "isbn13": "9780061120085", "isbn10": "0061120081"}),
        )
        .unwrap();
        assert_eq!(rec.isbn.as_deref(), Some("0061120081"));
    }

    #[test]
    fn keeps_invalid_isbn_for_the_reconciler() {
        let rec = from_payload("vision", &json!({"isbn": "978-0-06-112008-5"})).unwrap();
        assert_eq!(rec.isbn.as_deref(), Some("978-0-06-112008-5"));
    }

    #[test]
    fn isbn_from_ocr_text() {
        let rec = from_payload(
            "vision",
            &json!({"title": "Dracula", "additional_text": "Penguin Classics ISBN 0-14-243724-7 $12.00"}),
        )
        .unwrap();
        assert_eq!(rec.isbn.as_deref(), Some("0142437247"));
    }

    #[test]
    fn rejects_non_object_and_bad_confidence() {
        assert!(from_payload("vision", &json!("Dune")).is_err());
        let err = from_payload("vision", &json!({"title": "Dune", "confidence": "high"})).unwrap_err();
        assert!(err.to_string().contains("confidence"));
    }

    #[test]
    fn empty_payload_is_invalid() {
        let err = from_payload("vision", &json!({"title": "", "authors": []})).unwrap_err();
        assert!(matches!(err, ReconError::InvalidSourceRecord { .. }));
    }

    #[test]
    fn parses_source_array() {
        let json = r#"[
            {"source_id": "vision", "title": "To Kil a Mockingbrd", "confidence": 0.9},
            {"source": "googlebooks", "title": "To Kill a Mockingbird", "isbn13": "9780061120084"}
        ]"#;
        let sources = parse_sources_json(json).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].source_id, "googlebooks");
        assert_eq!(sources[1].isbn.as_deref(), Some("9780061120084"));
    }

    #[test]
    fn missing_source_id() {
        let err = parse_sources_json(r#"[{"title": "Dune"}]"#).unwrap_err();
        assert!(err.to_string().contains("#0"));
    }
}
