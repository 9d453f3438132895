use serde::{Deserialize, Serialize};

use crate::error::ReconError;

/// Confidence assumed for a source that did not report one.
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Author,
    Publisher,
    PublicationYear,
    Isbn,
    OclcNumber,
    Lccn,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Title,
        Field::Author,
        Field::Publisher,
        Field::PublicationYear,
        Field::Isbn,
        Field::OclcNumber,
        Field::Lccn,
    ];

    pub fn is_identifier(self) -> bool {
        matches!(self, Field::Isbn | Field::OclcNumber | Field::Lccn)
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Author => "author",
            Field::Publisher => "publisher",
            Field::PublicationYear => "publication_year",
            Field::Isbn => "isbn",
            Field::OclcNumber => "oclc_number",
            Field::Lccn => "lccn",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One collaborator's opinion about a book. Blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oclc_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lccn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl SourceRecord {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Self::default()
        }
    }

    /// Trimmed value of `field`, `None` when missing or blank.
    pub fn get(&self, field: Field) -> Option<&str> {
        let raw = match field {
            Field::Title => &self.title,
            Field::Author => &self.author,
            Field::Publisher => &self.publisher,
            Field::PublicationYear => &self.publication_year,
            Field::Isbn => &self.isbn,
            Field::OclcNumber => &self.oclc_number,
            Field::Lccn => &self.lccn,
        };
        raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_none())
    }

    pub fn effective_confidence(&self) -> f64 {
        self.confidence.unwrap_or(NEUTRAL_CONFIDENCE)
    }

    /// Reject records that must never reach the reconciler.
    pub fn validate(&self) -> Result<(), ReconError> {
        if self.source_id.trim().is_empty() {
            return Err(ReconError::invalid_source("", "empty source_id"));
        }
        if self.is_empty() {
            return Err(ReconError::invalid_source(&self.source_id, "every field is empty"));
        }
        if let Some(c) = self.confidence {
            if !c.is_finite() || !(0.0..=1.0).contains(&c) {
                return Err(ReconError::invalid_source(
                    &self.source_id,
                    format!("confidence {c} outside [0, 1]"),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Canonical record
// ---------------------------------------------------------------------------

/// A merged value together with the source that won it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValue {
    pub value: String,
    pub source_id: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Lost the tie-break against a disagreeing value.
    Outvoted,
    /// Identifier failed normalization or its check digit.
    InvalidIdentifier,
    /// Text with no letters or digits in it.
    Unreadable,
}

/// A candidate value that did not make it into the canonical record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discarded {
    pub field: Field,
    pub source_id: String,
    pub value: String,
    pub reason: DiscardReason,
}

/// The merged, provenance-tagged record. Field values are only ever replaced
/// as whole [`FieldValue`]s, so provenance always moves with the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oclc_number: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lccn: Option<FieldValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub discarded: Vec<Discarded>,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog_number: Option<String>,
}

impl CanonicalRecord {
    pub fn field(&self, field: Field) -> Option<&FieldValue> {
        match field {
            Field::Title => self.title.as_ref(),
            Field::Author => self.author.as_ref(),
            Field::Publisher => self.publisher.as_ref(),
            Field::PublicationYear => self.publication_year.as_ref(),
            Field::Isbn => self.isbn.as_ref(),
            Field::OclcNumber => self.oclc_number.as_ref(),
            Field::Lccn => self.lccn.as_ref(),
        }
    }

    pub(crate) fn set(&mut self, field: Field, value: FieldValue) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Author => &mut self.author,
            Field::Publisher => &mut self.publisher,
            Field::PublicationYear => &mut self.publication_year,
            Field::Isbn => &mut self.isbn,
            Field::OclcNumber => &mut self.oclc_number,
            Field::Lccn => &mut self.lccn,
        };
        *slot = Some(value);
    }

    /// Just the merged value of `field`.
    pub fn value(&self, field: Field) -> Option<&str> {
        self.field(field).map(|v| v.value.as_str())
    }

    pub fn has_identifier(&self) -> bool {
        self.isbn.is_some() || self.oclc_number.is_some() || self.lccn.is_some()
    }

    pub fn catalog_number(&self) -> Option<&str> {
        self.catalog_number.as_deref()
    }

    pub(crate) fn assign_catalog_number(&mut self, catalog_number: String) {
        self.catalog_number = Some(catalog_number);
    }

    /// The ledger row this record becomes once it has a catalog number.
    pub fn to_ledger_entry(&self) -> Option<LedgerEntry> {
        let owned = |f: Field| self.value(f).map(str::to_string);
        Some(LedgerEntry {
            catalog_number: self.catalog_number.clone()?,
            title: owned(Field::Title),
            author: owned(Field::Author),
            publisher: owned(Field::Publisher),
            publication_year: owned(Field::PublicationYear),
            isbn: owned(Field::Isbn),
            oclc_number: owned(Field::OclcNumber),
            lccn: owned(Field::Lccn),
        })
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A previously catalogued book, as the persistence collaborator stores it.
/// `catalog_number` may be empty for rows imported from other collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub catalog_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oclc_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lccn: Option<String>,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    New,
    Duplicate,
    /// Waiting for a human decision via `Engine::resolve`.
    Ambiguous,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub canonical_record: CanonicalRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_entry: Option<LedgerEntry>,
    pub similarity_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_absent() {
        let rec = SourceRecord {
            title: Some("   ".into()),
            isbn: Some("".into()),
            ..SourceRecord::new("vision")
        };
        assert!(rec.is_empty());
        assert_eq!(rec.get(Field::Title), None);
    }

    #[test]
    fn empty_record_rejected() {
        let err = SourceRecord::new("vision").validate().unwrap_err();
        assert!(matches!(err, ReconError::InvalidSourceRecord { .. }));
        assert!(err.to_string().contains("vision"));
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let rec = SourceRecord {
            title: Some("Dune".into()),
            confidence: Some(1.5),
            ..SourceRecord::new("vision")
        };
        assert!(rec.validate().is_err());

        let rec = SourceRecord {
            confidence: Some(f64::NAN),
            ..rec
        };
        assert!(rec.validate().is_err());
    }

    #[test]
    fn missing_confidence_is_neutral() {
        let rec = SourceRecord {
            title: Some("Dune".into()),
            ..SourceRecord::new("vision")
        };
        assert!(rec.validate().is_ok());
        assert_eq!(rec.effective_confidence(), NEUTRAL_CONFIDENCE);
    }

    #[test]
    fn ledger_entry_requires_catalog_number() {
        let mut rec = CanonicalRecord::default();
        rec.set(
            Field::Title,
            FieldValue {
                value: "Dune".into(),
                source_id: "vision".into(),
                confidence: 0.9,
            },
        );
        assert!(rec.to_ledger_entry().is_none());

        rec.assign_catalog_number("b0000007x".into());
        let entry = rec.to_ledger_entry().unwrap();
        assert_eq!(entry.catalog_number, "b0000007x");
        assert_eq!(entry.title.as_deref(), Some("Dune"));
        assert_eq!(entry.isbn, None);
    }

    #[test]
    fn field_names_round_trip() {
        for f in Field::ALL {
            assert_eq!(Field::from_name(f.name()), Some(f));
        }
        assert_eq!(Field::from_name("genre"), None);
    }
}
