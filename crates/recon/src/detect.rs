//! Duplicate detection against a ledger snapshot.

use crate::allocator::CatalogFormat;
use crate::config::{ReconConfig, ThresholdConfig};
use crate::model::{CanonicalRecord, LedgerEntry, Outcome, OutcomeStatus};
use crate::similarity::score;

/// Partition `[0, 1]` into the three outcomes. Total: every score (NaN
/// included) lands in exactly one status.
pub fn classify(score: f64, thresholds: &ThresholdConfig) -> OutcomeStatus {
    if score >= thresholds.duplicate {
        OutcomeStatus::Duplicate
    } else if score >= thresholds.ambiguous {
        OutcomeStatus::Ambiguous
    } else {
        OutcomeStatus::New
    }
}

/// Best-scoring ledger entry. Equal scores prefer the most recently issued
/// catalog number; entries whose number does not parse count as oldest, and
/// among those the later ledger row wins.
fn best_match<'l>(
    candidate: &CanonicalRecord,
    ledger: &'l [LedgerEntry],
    config: &ReconConfig,
    format: &CatalogFormat,
) -> Option<(&'l LedgerEntry, f64)> {
    ledger
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let s = score(candidate, entry, &config.scoring);
            (i, entry, s, format.parse_sequence(&entry.catalog_number))
        })
        .max_by(|a, b| {
            a.2.total_cmp(&b.2)
                .then_with(|| a.3.cmp(&b.3))
                .then_with(|| a.0.cmp(&b.0))
        })
        .map(|(_, entry, s, _)| (entry, s))
}

/// Score `candidate` against every ledger entry and classify the maximum.
/// The returned outcome carries a clone of the candidate; `matched_entry` is
/// set for DUPLICATE and AMBIGUOUS only.
pub fn detect(candidate: &CanonicalRecord, ledger: &[LedgerEntry], config: &ReconConfig) -> Outcome {
    let format = config.catalog.format();
    let (matched, similarity_score) = match best_match(candidate, ledger, config, &format) {
        Some((entry, s)) if s.is_finite() => (Some(entry), s),
        _ => (None, 0.0),
    };

    let status = classify(similarity_score, &config.thresholds);
    let matched_entry = match status {
        OutcomeStatus::New => None,
        OutcomeStatus::Duplicate | OutcomeStatus::Ambiguous => matched.cloned(),
    };

    tracing::debug!(
        %status,
        score = similarity_score,
        matched = matched_entry.as_ref().map(|e| e.catalog_number.as_str()),
        ledger_size = ledger.len(),
        "duplicate check"
    );

    Outcome {
        status,
        canonical_record: candidate.clone(),
        matched_entry,
        similarity_score,
    }
}
