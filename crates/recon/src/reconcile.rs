//! Field-by-field merge of several source records into one canonical record.

use std::cmp::Ordering;

use crate::config::{ReconConfig, TieBreak};
use crate::error::ReconError;
use crate::identifier::{compact, isbn_key, normalize_isbn, normalize_lccn, normalize_oclc};
use crate::model::{CanonicalRecord, DiscardReason, Discarded, Field, FieldValue, SourceRecord};
use crate::normalize::{collapse_whitespace, extract_year, fold, specificity};

/// One source's value for one field, ready for comparison.
#[derive(Debug, Clone)]
struct Candidate<'a> {
    index: usize,
    source_id: &'a str,
    /// Value as it will appear in the canonical record.
    value: String,
    /// Agreement key: two candidates agree iff their keys are equal.
    key: String,
    rank: usize,
    confidence: f64,
    specificity: (usize, usize),
}

/// Normalized (value, key) for `raw`, or the reason it cannot be used.
fn prepare(field: Field, raw: &str) -> Result<(String, String), DiscardReason> {
    match field {
        Field::Isbn => {
            let isbn = normalize_isbn(raw).ok_or(DiscardReason::InvalidIdentifier)?;
            let key = isbn_key(&isbn).ok_or(DiscardReason::InvalidIdentifier)?;
            Ok((isbn, key))
        }
        Field::OclcNumber => {
            let oclc = normalize_oclc(raw).ok_or(DiscardReason::InvalidIdentifier)?;
            Ok((oclc.clone(), oclc))
        }
        Field::Lccn => {
            let lccn = normalize_lccn(raw).ok_or(DiscardReason::InvalidIdentifier)?;
            Ok((lccn.clone(), lccn))
        }
        Field::PublicationYear => match extract_year(raw) {
            Some(year) => Ok((year.to_string(), year.to_string())),
            None => {
                let key = fold(raw);
                if key.is_empty() {
                    return Err(DiscardReason::Unreadable);
                }
                Ok((collapse_whitespace(raw), key))
            }
        },
        Field::Title | Field::Author | Field::Publisher => {
            let key = fold(raw);
            if key.is_empty() {
                return Err(DiscardReason::Unreadable);
            }
            Ok((collapse_whitespace(raw), key))
        }
    }
}

fn candidate_specificity(field: Field, value: &str) -> (usize, usize) {
    if field.is_identifier() {
        let len = compact(value).len();
        (len, len)
    } else {
        specificity(value)
    }
}

/// `Less` means `a` beats `b` under `criterion`.
fn compare(criterion: TieBreak, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    match criterion {
        TieBreak::Priority => a.rank.cmp(&b.rank),
        TieBreak::Confidence => b.confidence.total_cmp(&a.confidence),
        TieBreak::Specificity => b.specificity.cmp(&a.specificity),
    }
}

fn pick_winner<'c, 'a>(candidates: &'c [Candidate<'a>], order: &[TieBreak]) -> Option<&'c Candidate<'a>> {
    candidates.iter().min_by(|a, b| {
        order
            .iter()
            .map(|c| compare(*c, a, b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.index.cmp(&b.index))
    })
}

/// Merge `sources` into a [`CanonicalRecord`].
///
/// Each field is resolved independently: agreeing values are accepted with the
/// highest confidence among them; disagreeing values go through the configured
/// tie-break chain and the losers are kept in `discarded`. Values are never
/// averaged or concatenated.
pub fn reconcile_fields(sources: &[SourceRecord], config: &ReconConfig) -> Result<CanonicalRecord, ReconError> {
    if sources.is_empty() {
        return Err(ReconError::EmptySources);
    }
    for source in sources {
        source.validate()?;
    }

    let mut record = CanonicalRecord::default();

    for field in Field::ALL {
        let mut candidates = Vec::new();
        for (index, source) in sources.iter().enumerate() {
            let Some(raw) = source.get(field) else {
                continue;
            };
            match prepare(field, raw) {
                Ok((value, key)) => candidates.push(Candidate {
                    index,
                    source_id: source.source_id.trim(),
                    specificity: candidate_specificity(field, &value),
                    value,
                    key,
                    rank: config.priority.rank(field, &source.source_id),
                    confidence: source.effective_confidence(),
                }),
                Err(reason) => record.discarded.push(Discarded {
                    field,
                    source_id: source.source_id.trim().to_string(),
                    value: raw.to_string(),
                    reason,
                }),
            }
        }

        let Some(winner) = pick_winner(&candidates, &config.tie_break.order) else {
            continue;
        };

        let agreeing: Vec<&Candidate<'_>> = candidates.iter().filter(|c| c.key == winner.key).collect();
        let best = agreeing.iter().map(|c| c.confidence).fold(0.0_f64, f64::max);
        let confidence = if agreeing.len() == candidates.len() {
            best
        } else {
            best * agreeing.len() as f64 / candidates.len() as f64
        };

        for loser in candidates.iter().filter(|c| c.key != winner.key) {
            tracing::debug!(
                field = %field,
                winner = winner.source_id,
                loser = loser.source_id,
                kept = %winner.value,
                dropped = %loser.value,
                "conflicting values"
            );
            record.discarded.push(Discarded {
                field,
                source_id: loser.source_id.to_string(),
                value: loser.value.clone(),
                reason: DiscardReason::Outvoted,
            });
        }

        record.set(
            field,
            FieldValue {
                value: winner.value.clone(),
                source_id: winner.source_id.to_string(),
                confidence,
            },
        );
    }

    if record.title.is_none() && !record.has_identifier() {
        return Err(ReconError::InsufficientData);
    }
    Ok(record)
}
