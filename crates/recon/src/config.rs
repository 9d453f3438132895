use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::allocator::CatalogFormat;
use crate::error::ReconError;
use crate::model::Field;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub name: String,
    pub priority: PriorityConfig,
    pub tie_break: TieBreakConfig,
    pub thresholds: ThresholdConfig,
    pub scoring: ScoringConfig,
    pub catalog: CatalogConfig,
    pub ledger: LedgerConfig,
}

// ---------------------------------------------------------------------------
// Source priority
// ---------------------------------------------------------------------------

/// Ordered source lists, highest priority first.
///
/// `text` ranks sources for title/author/publisher/year, `identifier` for
/// ISBN/OCLC/LCCN. `fields` overrides the list for a single field, keyed by
/// field name (e.g. `lccn = ["loc", "openlibrary"]`). Sources missing from the
/// applicable list rank below every listed source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub text: Vec<String>,
    pub identifier: Vec<String>,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        let services = default_service_order();
        Self {
            text: services.clone(),
            identifier: services,
            fields: BTreeMap::new(),
        }
    }
}

/// Bibliographic services ahead of the cover-reading vision model.
fn default_service_order() -> Vec<String> {
    ["loc", "google_books", "googlebooks", "openlibrary", "worldcat", "isbnlib", "vision"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl PriorityConfig {
    fn list_for(&self, field: Field) -> &[String] {
        if let Some(list) = self.fields.get(field.name()) {
            return list;
        }
        if field.is_identifier() {
            &self.identifier
        } else {
            &self.text
        }
    }

    /// 0 = highest. Unlisted sources share the rank after the last listed one.
    pub fn rank(&self, field: Field, source_id: &str) -> usize {
        let list = self.list_for(field);
        list.iter()
            .position(|s| s.eq_ignore_ascii_case(source_id.trim()))
            .unwrap_or(list.len())
    }
}

// ---------------------------------------------------------------------------
// Tie-break
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Lower priority rank wins.
    Priority,
    /// Higher source confidence wins.
    Confidence,
    /// Longer, more complete value wins.
    Specificity,
}

/// Criteria applied in order when sources disagree on a field. Input order
/// settles whatever the chain leaves tied.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TieBreakConfig {
    pub order: Vec<TieBreak>,
}

impl Default for TieBreakConfig {
    fn default() -> Self {
        Self {
            order: vec![TieBreak::Priority, TieBreak::Confidence, TieBreak::Specificity],
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds + scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub duplicate: f64,
    pub ambiguous: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            duplicate: 0.85,
            ambiguous: 0.65,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub title_weight: f64,
    pub author_weight: f64,
    pub year_weight: f64,
    /// Highest score two records with conflicting identifiers can reach.
    pub identifier_mismatch_ceiling: f64,
    /// Spread the weight of a component missing on either side over the
    /// components both records carry. Off by default: a missing author or
    /// year scores zero, so a title-only match stays below the duplicate
    /// threshold.
    pub renormalize_missing: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            title_weight: 0.5,
            author_weight: 0.3,
            year_weight: 0.2,
            identifier_mismatch_ceiling: 0.3,
            renormalize_missing: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog number + ledger layout
// ---------------------------------------------------------------------------

/// Catalog number layout: `{prefix}{sequence:0width}{suffix}`, e.g. `b0000001x`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub prefix: String,
    pub width: usize,
    pub suffix: String,
    /// Highest sequence already issued before the counter existed.
    pub start_after: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            prefix: "b".into(),
            width: 7,
            suffix: "x".into(),
            start_after: 0,
        }
    }
}

impl CatalogConfig {
    pub fn format(&self) -> CatalogFormat {
        CatalogFormat {
            prefix: self.prefix.clone(),
            width: self.width,
            suffix: self.suffix.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub columns: LedgerColumns,
}

/// Ledger CSV header names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerColumns {
    pub catalog_number: String,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub publication_year: String,
    pub isbn: String,
    pub oclc_number: String,
    pub lccn: String,
}

impl Default for LedgerColumns {
    fn default() -> Self {
        Self {
            catalog_number: "CATALOG no.".into(),
            title: "TITLE".into(),
            author: "AUTHOR".into(),
            publisher: "PUBLISHED".into(),
            publication_year: "D.O. Pub.".into(),
            isbn: "ISBN".into(),
            oclc_number: "OCLC no.".into(),
            lccn: "LC no.".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let invalid = |msg: String| Err(ReconError::ConfigValidation(msg));

        // Priority lists
        let mut lists: Vec<(String, &Vec<String>)> = vec![
            ("priority.text".into(), &self.priority.text),
            ("priority.identifier".into(), &self.priority.identifier),
        ];
        for (name, list) in &self.priority.fields {
            if Field::from_name(name).is_none() {
                return invalid(format!("priority.fields: unknown field '{name}'"));
            }
            lists.push((format!("priority.fields.{name}"), list));
        }
        for (name, list) in lists {
            let mut seen = HashSet::new();
            for source in list {
                if source.trim().is_empty() {
                    return invalid(format!("{name}: empty source id"));
                }
                if !seen.insert(source.trim().to_ascii_lowercase()) {
                    return invalid(format!("{name}: source '{source}' listed twice"));
                }
            }
        }

        // Tie-break chain
        if self.tie_break.order.is_empty() {
            return invalid("tie_break.order must name at least one criterion".into());
        }
        let unique: HashSet<_> = self.tie_break.order.iter().collect();
        if unique.len() != self.tie_break.order.len() {
            return invalid("tie_break.order repeats a criterion".into());
        }

        // Thresholds: 0 <= ambiguous <= duplicate <= 1
        let t = &self.thresholds;
        if !(0.0..=1.0).contains(&t.duplicate) || !(0.0..=1.0).contains(&t.ambiguous) {
            return invalid(format!(
                "thresholds must lie in [0, 1], got duplicate={} ambiguous={}",
                t.duplicate, t.ambiguous
            ));
        }
        if t.ambiguous > t.duplicate {
            return invalid(format!(
                "thresholds.ambiguous ({}) exceeds thresholds.duplicate ({})",
                t.ambiguous, t.duplicate
            ));
        }

        // Scoring
        let s = &self.scoring;
        for (name, w) in [
            ("title_weight", s.title_weight),
            ("author_weight", s.author_weight),
            ("year_weight", s.year_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                return invalid(format!("scoring.{name} must be a non-negative number, got {w}"));
            }
        }
        if s.title_weight <= 0.0 {
            return invalid("scoring.title_weight must be positive".into());
        }
        if !(0.0..1.0).contains(&s.identifier_mismatch_ceiling) {
            return invalid(format!(
                "scoring.identifier_mismatch_ceiling must lie in [0, 1), got {}",
                s.identifier_mismatch_ceiling
            ));
        }

        // Catalog format
        let c = &self.catalog;
        if c.width == 0 || c.width > 18 {
            return invalid(format!("catalog.width must be 1..=18, got {}", c.width));
        }
        if c.prefix.chars().any(|ch| ch.is_ascii_digit()) || c.suffix.chars().any(|ch| ch.is_ascii_digit()) {
            return invalid("catalog.prefix and catalog.suffix must not contain digits".into());
        }
        if c.start_after > c.format().max_sequence() {
            return invalid(format!(
                "catalog.start_after ({}) does not fit in {} digit(s)",
                c.start_after, c.width
            ));
        }

        // Ledger columns
        let cols = &self.ledger.columns;
        if cols.catalog_number.trim().is_empty() || cols.title.trim().is_empty() {
            return invalid("ledger.columns.catalog_number and ledger.columns.title are required".into());
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
