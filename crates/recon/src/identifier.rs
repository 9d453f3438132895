//! Bibliographic identifiers: ISBN, OCLC number, LCCN.
//!
//! Every normalizer returns `None` for values that cannot be trusted, so
//! callers treat an unusable identifier as absent rather than comparing it.

use std::sync::LazyLock;

use regex::Regex;

/// Runs of digits (with hyphen/space separators) long enough to be an ISBN.
static ISBN_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\d[\s-]?){9,12}[\dXx]\b").unwrap());

// ---------------------------------------------------------------------------
// ISBN
// ---------------------------------------------------------------------------

/// Strip formatting noise: keep ASCII alphanumerics, uppercase the `x` check digit.
pub fn compact(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// ISBN-10 checksum: weighted sum (10..1) must be divisible by 11. `X` = 10,
/// only valid as the last character.
pub fn is_valid_isbn10(isbn: &str) -> bool {
    let bytes = isbn.as_bytes();
    if bytes.len() != 10 {
        return false;
    }
    let mut sum = 0u32;
    for (i, &b) in bytes.iter().enumerate() {
        let digit = match b {
            b'0'..=b'9' => (b - b'0') as u32,
            b'X' if i == 9 => 10,
            _ => return false,
        };
        sum += digit * (10 - i as u32);
    }
    sum % 11 == 0
}

/// ISBN-13 checksum: alternating 1/3 weights, sum divisible by 10. Only the
/// bookland prefixes 978 and 979 are accepted.
pub fn is_valid_isbn13(isbn: &str) -> bool {
    if isbn.len() != 13 || !isbn.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if !(isbn.starts_with("978") || isbn.starts_with("979")) {
        return false;
    }
    let sum: u32 = isbn
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let d = (b - b'0') as u32;
            if i % 2 == 0 { d } else { d * 3 }
        })
        .sum();
    sum % 10 == 0
}

/// Compact and validate. Returns the ISBN as the source wrote it (10 or 13
/// characters, no separators) or `None` if the check digit is wrong.
pub fn normalize_isbn(raw: &str) -> Option<String> {
    let isbn = compact(raw);
    match isbn.len() {
        10 if is_valid_isbn10(&isbn) => Some(isbn),
        13 if is_valid_isbn13(&isbn) => Some(isbn),
        _ => None,
    }
}

/// Convert a valid ISBN-10 to its 978-prefixed ISBN-13.
pub fn isbn10_to_13(isbn10: &str) -> String {
    let body = format!("978{}", &isbn10[..9]);
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let d = (b - b'0') as u32;
            if i % 2 == 0 { d } else { d * 3 }
        })
        .sum();
    let check = (10 - sum % 10) % 10;
    format!("{body}{check}")
}

/// Convert a 978-prefixed ISBN-13 back to ISBN-10. 979 numbers have no
/// ISBN-10 form.
pub fn isbn13_to_10(isbn13: &str) -> Option<String> {
    if !isbn13.starts_with("978") || !is_valid_isbn13(isbn13) {
        return None;
    }
    let body = &isbn13[3..12];
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| (b - b'0') as u32 * (10 - i as u32))
        .sum();
    let check = match (11 - sum % 11) % 11 {
        10 => 'X',
        d => char::from(b'0' + d as u8),
    };
    Some(format!("{body}{check}"))
}

/// Comparison key: the ISBN-13 form of any valid ISBN, so an ISBN-10 and its
/// ISBN-13 sibling compare equal.
pub fn isbn_key(raw: &str) -> Option<String> {
    let isbn = normalize_isbn(raw)?;
    if isbn.len() == 10 {
        Some(isbn10_to_13(&isbn))
    } else {
        Some(isbn)
    }
}

/// Find every valid ISBN embedded in free text (OCR output, copyright pages).
/// Duplicates (including 10/13 siblings) are reported once, in order of
/// first appearance.
pub fn find_isbns(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut keys: Vec<String> = Vec::new();
    for m in ISBN_LIKE.find_iter(text) {
        let Some(isbn) = normalize_isbn(m.as_str()) else {
            continue;
        };
        let key = isbn_key(&isbn).unwrap_or_else(|| isbn.clone());
        if !keys.contains(&key) {
            keys.push(key);
            found.push(isbn);
        }
    }
    found
}

// ---------------------------------------------------------------------------
// OCLC / LCCN
// ---------------------------------------------------------------------------

/// OCLC numbers compare on their digits with leading zeros removed, so
/// `ocm00012345`, `(OCoLC)12345` and `12345` are the same record.
pub fn normalize_oclc(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Library of Congress LCCN normalization: drop whitespace and anything after
/// a `/`, zero-pad the serial after a hyphen to six digits, lowercase the
/// alphabetic prefix.
pub fn normalize_lccn(raw: &str) -> Option<String> {
    let squeezed: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let head = squeezed.split('/').next().unwrap_or("");

    let joined = match head.split_once('-') {
        Some((year, serial)) if !serial.is_empty() && serial.chars().all(|c| c.is_ascii_digit()) => {
            format!("{year}{serial:0>6}")
        }
        _ => head.to_string(),
    };

    let lccn: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if lccn.chars().any(|c| c.is_ascii_digit()) {
        Some(lccn)
    } else {
        None
    }
}
