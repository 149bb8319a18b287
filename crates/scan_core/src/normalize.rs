//! Plate normalization
//!
//! Turns noisy OCR text into a canonical UK registration string:
//! - Uppercase, newlines folded to spaces, everything outside `[A-Z0-9 ]` dropped
//! - Letter `O` rewritten to digit `0` before any matching (lossy, kept for
//!   compatibility with existing lookup keys)
//! - Plate-shape patterns tried most specific first; the first pattern with
//!   any match wins, and among its matches the one closest to 7 significant
//!   characters is chosen (earliest on ties)

use crate::types::CanonicalPlate;
use regex::Regex;
use std::sync::LazyLock;

/// Significant characters in a current-format mark
const TARGET_LEN: usize = 7;

/// Plate-shape patterns, most specific first
static PLATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Current format: AB12 CDE. Letter slots accept 0 because O has
        // already been rewritten.
        r"[A-Z0]{2}[0-9]{2} ?[A-Z0]{3}",
        // Prefix/suffix and cherished marks: A123 BCD, ABC 123D, K1 NGS.
        // Word-bounded so free text such as "N0 PLATE" does not match.
        r"\b[A-Z]{1,3} ?[0-9]{1,4} ?[A-Z]{1,3}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid plate pattern"))
    .collect()
});

/// Uppercase, fold newlines, drop noise characters and rewrite `O` to `0`
pub fn clean_ocr_text(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .map(|c| match c {
            '\n' | '\r' => ' ',
            'O' => '0',
            other => other,
        })
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == ' ')
        .collect()
}

/// Extract the canonical plate from raw OCR text
///
/// Returns `None` for missing or empty input and for text with nothing
/// plate-shaped in it.
pub fn normalize(raw: Option<&str>) -> Option<CanonicalPlate> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }

    let cleaned = clean_ocr_text(raw);

    PLATE_PATTERNS
        .iter()
        .find_map(|pattern| best_candidate(pattern, &cleaned))
        .map(CanonicalPlate::from_normalized)
}

/// Pick the match closest to [`TARGET_LEN`], preferring the earliest
fn best_candidate(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .find_iter(text)
        .map(|m| strip_spaces(m.as_str()))
        // min_by_key keeps the first of equal keys, so source order breaks ties
        .min_by_key(|candidate| candidate.len().abs_diff(TARGET_LEN))
}

fn strip_spaces(s: &str) -> String {
    s.chars().filter(|c| *c != ' ').collect()
}
