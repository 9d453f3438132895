//! Record similarity in `[0, 1]`.

use std::collections::BTreeSet;

use crate::config::ScoringConfig;
use crate::identifier::{isbn_key, normalize_lccn, normalize_oclc};
use crate::model::{CanonicalRecord, Field, LedgerEntry};
use crate::normalize::{extract_year, normalize_author, normalize_title};

/// Read-only view over the fields the scorer compares.
pub trait RecordView {
    fn title(&self) -> Option<&str>;
    fn author(&self) -> Option<&str>;
    fn publication_year(&self) -> Option<&str>;
    fn isbn(&self) -> Option<&str>;
    fn oclc_number(&self) -> Option<&str>;
    fn lccn(&self) -> Option<&str>;
}

impl RecordView for CanonicalRecord {
    fn title(&self) -> Option<&str> {
        self.value(Field::Title)
    }
    fn author(&self) -> Option<&str> {
        self.value(Field::Author)
    }
    fn publication_year(&self) -> Option<&str> {
        self.value(Field::PublicationYear)
    }
    fn isbn(&self) -> Option<&str> {
        self.value(Field::Isbn)
    }
    fn oclc_number(&self) -> Option<&str> {
        self.value(Field::OclcNumber)
    }
    fn lccn(&self) -> Option<&str> {
        self.value(Field::Lccn)
    }
}

impl RecordView for LedgerEntry {
    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
    fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
    fn publication_year(&self) -> Option<&str> {
        self.publication_year.as_deref()
    }
    fn isbn(&self) -> Option<&str> {
        self.isbn.as_deref()
    }
    fn oclc_number(&self) -> Option<&str> {
        self.oclc_number.as_deref()
    }
    fn lccn(&self) -> Option<&str> {
        self.lccn.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentifierCheck {
    /// Some identifier kind is present and equal on both sides.
    Match,
    /// Some kind is comparable, none equal.
    Conflict,
    /// No kind present on both sides.
    Incomparable,
}

fn check_identifiers<A: RecordView + ?Sized, B: RecordView + ?Sized>(a: &A, b: &B) -> IdentifierCheck {
    let pairs = [
        (a.isbn().and_then(isbn_key), b.isbn().and_then(isbn_key)),
        (a.oclc_number().and_then(normalize_oclc), b.oclc_number().and_then(normalize_oclc)),
        (a.lccn().and_then(normalize_lccn), b.lccn().and_then(normalize_lccn)),
    ];

    let mut conflict = false;
    for pair in pairs {
        match pair {
            (Some(x), Some(y)) if x == y => return IdentifierCheck::Match,
            (Some(_), Some(_)) => conflict = true,
            _ => {}
        }
    }
    if conflict {
        IdentifierCheck::Conflict
    } else {
        IdentifierCheck::Incomparable
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Token-set ratio over already-folded strings: sorted shared tokens plus
/// each side's leftovers, compared with normalized Levenshtein similarity.
/// Word order and small OCR slips cost little. A title whose words are all
/// contained in a longer one ("dune" in "dune messiah") earns partial
/// credit only, so 1.0 means the token sets are equal.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return if ta.is_empty() && tb.is_empty() { 1.0 } else { 0.0 };
    }

    let join = |tokens: Vec<&str>| tokens.join(" ");
    let shared = join(ta.intersection(&tb).copied().collect());
    let only_a = join(ta.difference(&tb).copied().collect());
    let only_b = join(tb.difference(&ta).copied().collect());

    let with = |rest: &str| {
        if shared.is_empty() {
            rest.to_string()
        } else if rest.is_empty() {
            shared.clone()
        } else {
            format!("{shared} {rest}")
        }
    };
    let full_a = with(&only_a);
    let full_b = with(&only_b);

    let across = strsim::normalized_levenshtein(&full_a, &full_b);
    if shared.is_empty() {
        return across;
    }
    let contained = strsim::normalized_levenshtein(&shared, &full_a)
        .max(strsim::normalized_levenshtein(&shared, &full_b));
    across.max((contained + across) / 2.0)
}

fn year_closeness(a: i32, b: i32) -> f64 {
    match (a - b).abs() {
        0 => 1.0,
        1 => 0.5,
        _ => 0.0,
    }
}

/// Weighted title/author/year similarity, ignoring identifiers.
pub fn text_score<A: RecordView + ?Sized, B: RecordView + ?Sized>(a: &A, b: &B, scoring: &ScoringConfig) -> f64 {
    let (Some(ta), Some(tb)) = (a.title().map(normalize_title), b.title().map(normalize_title)) else {
        return 0.0;
    };
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let mut weighted = scoring.title_weight * token_set_ratio(&ta, &tb);
    let mut present = scoring.title_weight;

    let authors = (a.author().map(normalize_author), b.author().map(normalize_author));
    if let (Some(x), Some(y)) = authors {
        if !x.is_empty() && !y.is_empty() {
            weighted += scoring.author_weight * token_set_ratio(&x, &y);
            present += scoring.author_weight;
        }
    }

    let years = (
        a.publication_year().and_then(extract_year),
        b.publication_year().and_then(extract_year),
    );
    if let (Some(x), Some(y)) = years {
        weighted += scoring.year_weight * year_closeness(x, y);
        present += scoring.year_weight;
    }

    let denominator = if scoring.renormalize_missing {
        present
    } else {
        scoring.title_weight + scoring.author_weight + scoring.year_weight
    };
    if denominator <= 0.0 {
        return 0.0;
    }
    (weighted / denominator).clamp(0.0, 1.0)
}

/// Similarity between two records.
///
/// A shared identifier decides immediately (1.0). Conflicting identifiers
/// cap the text score at `identifier_mismatch_ceiling`, so two editions with
/// the same title never look like the same book.
pub fn score<A: RecordView + ?Sized, B: RecordView + ?Sized>(a: &A, b: &B, scoring: &ScoringConfig) -> f64 {
    match check_identifiers(a, b) {
        IdentifierCheck::Match => 1.0,
        IdentifierCheck::Conflict => scoring.identifier_mismatch_ceiling * text_score(a, b, scoring),
        IdentifierCheck::Incomparable => text_score(a, b, scoring),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> LedgerEntry {
        LedgerEntry {
            catalog_number: "b0000001x".into(),
            title: Some(title.into()),
            ..LedgerEntry::default()
        }
    }

    fn cfg() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn token_set_ignores_order_and_subsets() {
        assert_eq!(token_set_ratio("harper lee", "lee harper"), 1.0);
        assert_eq!(token_set_ratio("moby dick", "dick moby moby"), 1.0);
        assert_eq!(token_set_ratio("", ""), 1.0);
        assert_eq!(token_set_ratio("dune", ""), 0.0);
    }

    #[test]
    fn contained_title_is_only_partial_credit() {
        // across = 1 - 8/12, contained = 1.0
        let r = token_set_ratio("dune", "dune messiah");
        assert!((r - 2.0 / 3.0).abs() < 1e-12, "got {r}");
        assert!(token_set_ratio("emma", "emma and the vampires") < 0.6);
        assert_eq!(token_set_ratio("dune messiah", "dune"), r);
    }

    #[test]
    fn sequel_by_same_author_is_not_a_duplicate() {
        let ledger = LedgerEntry {
            author: Some("Frank Herbert".into()),
            ..entry("Dune Messiah")
        };
        let candidate = LedgerEntry {
            author: Some("Frank Herbert".into()),
            ..entry("Dune")
        };
        // 0.5 * 2/3 + 0.3
        let s = score(&candidate, &ledger, &cfg());
        assert!((s - (0.5 * 2.0 / 3.0 + 0.3)).abs() < 1e-12, "got {s}");
        assert!(s < 0.85);

        let spin_off = score(&entry("Emma"), &entry("Emma and the Vampires"), &cfg());
        assert!(spin_off < 0.65, "got {spin_off}");
    }

    #[test]
    fn token_set_tolerates_ocr_noise() {
        let r = token_set_ratio("to kil a mockingbrd", "to kill a mockingbird");
        assert!(r > 0.85, "got {r}");
        let unrelated = token_set_ratio("moby dick", "pride and prejudice");
        assert!(unrelated < 0.4, "got {unrelated}");
    }

    #[test]
    fn equal_isbn_short_circuits() {
        let a = LedgerEntry {
            isbn: Some("0-06-112008-1".into()),
            ..entry("Completely different")
        };
        let b = LedgerEntry {
            isbn: Some("9780061120084".into()),
            ..entry("To Kill a Mockingbird")
        };
        assert_eq!(score(&a, &b, &cfg()), 1.0);
    }

    #[test]
    fn conflicting_isbns_cap_the_score() {
        let a = LedgerEntry {
            isbn: Some("9780061120084".into()),
            ..entry("To Kill a Mockingbird")
        };
        let b = LedgerEntry {
            isbn: Some("9780446310789".into()),
            ..entry("To Kill a Mockingbird")
        };
        let s = score(&a, &b, &cfg());
        assert!(s <= 0.3 + 1e-12, "got {s}");
        assert!(s > 0.0);
    }

    #[test]
    fn oclc_match_counts_even_when_isbn_missing() {
        let a = LedgerEntry {
            oclc_number: Some("ocm00012345".into()),
            ..entry("A")
        };
        let b = LedgerEntry {
            oclc_number: Some("12345".into()),
            ..entry("B")
        };
        assert_eq!(score(&a, &b, &cfg()), 1.0);
    }

    #[test]
    fn invalid_ledger_isbn_is_ignored() {
        let a = LedgerEntry {
            isbn: Some("9780061120085".into()),
            ..entry("Moby Dick")
        };
        let b = LedgerEntry {
            isbn: Some("9780061120084".into()),
            ..entry("Moby Dick")
        };
        // No comparable identifier → pure text score, title weight only
        assert!((score(&a, &b, &cfg()) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn missing_title_scores_zero() {
        let a = LedgerEntry {
            title: None,
            ..entry("x")
        };
        assert_eq!(score(&a, &entry("Moby Dick"), &cfg()), 0.0);
    }

    #[test]
    fn year_and_author_weigh_in() {
        let a = LedgerEntry {
            author: Some("Herman Melville".into()),
            publication_year: Some("1851".into()),
            ..entry("Moby Dick")
        };
        let same = LedgerEntry {
            author: Some("Melville, Herman".into()),
            publication_year: Some("c1851".into()),
            ..entry("Moby-Dick")
        };
        assert!((score(&a, &same, &cfg()) - 1.0).abs() < 1e-12);

        let off_by_one = LedgerEntry {
            publication_year: Some("1852".into()),
            ..same.clone()
        };
        // 0.5 + 0.3 + 0.2 * 0.5
        assert!((score(&a, &off_by_one, &cfg()) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn missing_components_contribute_nothing_by_default() {
        let a = entry("Moby Dick");
        let b = LedgerEntry {
            author: Some("Herman Melville".into()),
            ..entry("Moby Dick")
        };
        // Title alone tops out at its weight; author missing on one side
        assert!((score(&a, &b, &cfg()) - 0.5).abs() < 1e-12);
        assert!((score(&b, &b, &cfg()) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn renormalization_can_be_enabled() {
        let a = entry("Moby Dick");
        let b = entry("Moby Dick");
        let spread = ScoringConfig {
            renormalize_missing: true,
            ..cfg()
        };
        assert_eq!(score(&a, &b, &spread), 1.0);
    }

    #[test]
    fn bracketed_qualifiers_do_not_count() {
        let a = entry("Moby Dick (Penguin Classics)");
        let b = entry("Moby Dick");
        assert_eq!(score(&a, &b, &cfg()), score(&b, &b, &cfg()));
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let a = entry("Dune");
        for t in ["Dune", "Dune Messiah", "Emma", "", "!!"] {
            let s = score(&a, &entry(t), &cfg());
            assert!((0.0..=1.0).contains(&s), "{t}: {s}");
        }
    }
}
