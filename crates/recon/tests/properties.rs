// Property-based tests for the merge, scoring and numbering invariants.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use shelfmark_recon::allocator::{Allocator, CatalogFormat, MemorySequenceStore};
use shelfmark_recon::config::{ReconConfig, ScoringConfig, ThresholdConfig};
use shelfmark_recon::detect::classify;
use shelfmark_recon::identifier::{isbn10_to_13, isbn_key};
use shelfmark_recon::model::Field;
use shelfmark_recon::reconcile::reconcile_fields;
use shelfmark_recon::similarity::{score, token_set_ratio};
use shelfmark_recon::{LedgerEntry, OutcomeStatus, SourceRecord};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const SOURCES: [&str; 5] = ["vision", "googlebooks", "openlibrary", "loc", "scanner"];

fn arb_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        3 => r"[A-Za-z][A-Za-z ,'-]{0,24}".prop_map(Some),
        1 => Just(None),
    ]
}

/// A valid ISBN-13 built from a random ISBN-10 body.
fn arb_valid_isbn() -> impl Strategy<Value = String> {
    "[0-9]{9}".prop_map(|body| {
        let sum: u32 = body
            .bytes()
            .enumerate()
            .map(|(i, b)| (b - b'0') as u32 * (10 - i as u32))
            .sum();
        let check = match (11 - sum % 11) % 11 {
            10 => 'X',
            d => char::from(b'0' + d as u8),
        };
        isbn10_to_13(&format!("{body}{check}"))
    })
}

fn arb_source() -> impl Strategy<Value = SourceRecord> {
    (
        prop::sample::select(SOURCES.to_vec()),
        r"[A-Za-z][A-Za-z ]{0,20}",
        arb_text(),
        arb_text(),
        prop::option::of(1800i32..2030),
        prop::option::of(0.0f64..=1.0),
    )
        .prop_map(|(source_id, title, author, publisher, year, confidence)| SourceRecord {
            title: Some(title),
            author,
            publisher,
            publication_year: year.map(|y| y.to_string()),
            confidence,
            ..SourceRecord::new(source_id)
        })
}

fn arb_entry() -> impl Strategy<Value = LedgerEntry> {
    (
        r"[A-Za-z][A-Za-z ]{0,20}",
        arb_text(),
        prop::option::of(arb_valid_isbn()),
        prop::option::of(1800i32..2030),
    )
        .prop_map(|(title, author, isbn, year)| LedgerEntry {
            catalog_number: String::new(),
            title: Some(title),
            author,
            isbn,
            publication_year: year.map(|y| y.to_string()),
            ..LedgerEntry::default()
        })
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn merge_is_idempotent(source in arb_source(), copies in 1usize..5) {
        let config = ReconConfig::default();
        let single = reconcile_fields(std::slice::from_ref(&source), &config).unwrap();
        let many = reconcile_fields(&vec![source; copies], &config).unwrap();

        for field in Field::ALL {
            prop_assert_eq!(single.value(field), many.value(field), "field {}", field);
        }
        prop_assert!(many.discarded.is_empty());
    }

    #[test]
    fn merge_is_deterministic(sources in prop::collection::vec(arb_source(), 1..6)) {
        let config = ReconConfig::default();
        let a = reconcile_fields(&sources, &config).unwrap();
        let b = reconcile_fields(&sources, &config).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn winner_comes_from_some_source(sources in prop::collection::vec(arb_source(), 1..6)) {
        let rec = reconcile_fields(&sources, &ReconConfig::default()).unwrap();
        let title = rec.title.as_ref().unwrap();
        prop_assert!(sources.iter().any(|s| s.source_id == title.source_id));
        prop_assert!((0.0..=1.0).contains(&title.confidence));
    }

    #[test]
    fn single_valid_isbn_wins(
        sources in prop::collection::vec(arb_source(), 1..5),
        isbn in arb_valid_isbn(),
        holder in 0usize..5,
        junk in "[0-9]{13}",
    ) {
        let mut sources = sources;
        let holder = holder % sources.len();
        for (i, s) in sources.iter_mut().enumerate() {
            if i == holder {
                s.isbn = Some(isbn.clone());
            } else if isbn_key(&junk).is_none() {
                s.isbn = Some(junk.clone());
            }
        }
        let rec = reconcile_fields(&sources, &ReconConfig::default()).unwrap();
        prop_assert_eq!(rec.value(Field::Isbn), Some(isbn.as_str()));
    }
}

// ---------------------------------------------------------------------------
// Scoring + classification
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn equal_isbn_scores_one(a in arb_entry(), b in arb_entry(), isbn in arb_valid_isbn()) {
        let a = LedgerEntry { isbn: Some(isbn.clone()), ..a };
        let b = LedgerEntry { isbn: Some(isbn), ..b };
        prop_assert_eq!(score(&a, &b, &ScoringConfig::default()), 1.0);
    }

    #[test]
    fn conflicting_isbns_stay_under_ceiling(a in arb_entry(), b in arb_entry(), x in arb_valid_isbn(), y in arb_valid_isbn()) {
        prop_assume!(x != y);
        let a = LedgerEntry { isbn: Some(x), ..a };
        let b = LedgerEntry { isbn: Some(y), ..b };
        let s = score(&a, &b, &ScoringConfig::default());
        prop_assert!(s <= 0.3 + 1e-12, "score {}", s);
    }

    #[test]
    fn score_is_bounded_and_symmetric(a in arb_entry(), b in arb_entry()) {
        let scoring = ScoringConfig::default();
        let ab = score(&a, &b, &scoring);
        let ba = score(&b, &a, &scoring);
        prop_assert!((0.0..=1.0).contains(&ab));
        prop_assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn extra_title_words_never_score_one(
        words in prop::collection::vec("[a-z]{2,8}", 1..4),
        extra in "[a-z]{2,8}",
    ) {
        prop_assume!(!words.contains(&extra));
        let base = words.join(" ");
        let longer = format!("{base} {extra}");
        prop_assert!(token_set_ratio(&base, &longer) < 1.0);
    }

    #[test]
    fn missing_author_keeps_text_match_below_duplicate(a in arb_entry(), b in arb_entry()) {
        let strip = |e: LedgerEntry| LedgerEntry { isbn: None, oclc_number: None, lccn: None, ..e };
        let a = LedgerEntry { author: None, ..strip(a) };
        let b = strip(b);
        let s = score(&a, &b, &ScoringConfig::default());
        prop_assert!(s < ThresholdConfig::default().duplicate, "score {}", s);
    }

    #[test]
    fn classification_is_total(s in 0.0f64..=1.0, amb in 0.0f64..=1.0, dup in 0.0f64..=1.0) {
        let (ambiguous, duplicate) = if amb <= dup { (amb, dup) } else { (dup, amb) };
        let t = ThresholdConfig { duplicate, ambiguous };
        let expected = if s >= duplicate {
            OutcomeStatus::Duplicate
        } else if s >= ambiguous {
            OutcomeStatus::Ambiguous
        } else {
            OutcomeStatus::New
        };
        prop_assert_eq!(classify(s, &t), expected);
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn allocation_is_monotonic(start in 0u64..1_000_000, floors in prop::collection::vec(0u64..2_000_000, 1..20)) {
        let format = CatalogFormat::default();
        let alloc = Allocator::new(format.clone(), MemorySequenceStore::new(start));
        let mut last = start;
        for floor in floors {
            let a = alloc.allocate_above(floor).unwrap();
            prop_assert!(a.sequence > last);
            prop_assert!(a.sequence > floor);
            prop_assert_eq!(format.parse_sequence(&a.catalog_number), Some(a.sequence));
            last = a.sequence;
        }
    }
}
