//! Text folding used for agreement checks and similarity scoring.

use std::sync::LazyLock;

use regex::Regex;

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").unwrap());

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|\D)(1\d{3}|20\d{2})(?:\D|$)").unwrap());

static AUTHOR_JOINERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:&|\band\b|;)\s*").unwrap());

/// Lowercase, turn every non-alphanumeric run into a single space, trim.
/// "The  Great-Gatsby!" → "the great gatsby".
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Collapse internal whitespace and trim, keeping case and punctuation.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title comparison form: bracketed qualifiers such as "(Penguin Classics)"
/// or "[large print]" removed, then folded. A title that is entirely
/// bracketed keeps its content.
pub fn normalize_title(title: &str) -> String {
    let stripped = fold(&BRACKETED.replace_all(title, " "));
    if stripped.is_empty() {
        fold(title)
    } else {
        stripped
    }
}

/// Author comparison form. Joiners (`&`, `and`, `;`) become separators so
/// "Strunk & White" and "White, E. B.; Strunk, William" share tokens.
pub fn normalize_author(author: &str) -> String {
    fold(&AUTHOR_JOINERS.replace_all(author, ", "))
}

/// First plausible publication year (1000-2099) in a free-form date such as
/// "c1960", "July 11, 1960" or "1960-07-11".
pub fn extract_year(text: &str) -> Option<i32> {
    YEAR.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// How complete a value looks: alphanumeric character count, then raw length.
pub fn specificity(text: &str) -> (usize, usize) {
    (
        text.chars().filter(|c| c.is_alphanumeric()).count(),
        text.chars().count(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_collapses_case_and_punctuation() {
        assert_eq!(fold("  The  Great-Gatsby! "), "the great gatsby");
        assert_eq!(fold("Éire: A History"), "éire a history");
        assert_eq!(fold("?!"), "");
    }

    #[test]
    fn title_drops_bracketed_qualifiers() {
        assert_eq!(normalize_title("Moby Dick (Penguin Classics)"), "moby dick");
        assert_eq!(normalize_title("Dune [large print]"), "dune");
        assert_eq!(normalize_title("(Untitled)"), "untitled");
    }

    #[test]
    fn author_joiners_become_separators() {
        assert_eq!(normalize_author("Strunk & White"), "strunk white");
        assert_eq!(normalize_author("Lee, Harper"), "lee harper");
        assert_eq!(normalize_author("Sandra Anderson"), "sandra anderson");
    }

    #[test]
    fn year_from_free_form_dates() {
        assert_eq!(extract_year("July 11, 1960"), Some(1960));
        assert_eq!(extract_year("c2006"), Some(2006));
        assert_eq!(extract_year("120065"), None);
        assert_eq!(extract_year("©2006"), Some(2006));
        assert_eq!(extract_year("2006-05-23"), Some(2006));
        assert_eq!(extract_year("n.d."), None);
    }

    #[test]
    fn specificity_prefers_longer_values() {
        assert!(specificity("To Kill a Mockingbird") > specificity("To Kill a Mockingbrd"));
    }
}
