//! Text normalization and similarity scoring for concept matching.

use std::collections::BTreeSet;

/// Lower-case, non-alphanumerics become spaces, whitespace collapsed.
///
/// `"Long-term (U.S.) unemployment"` → `"long term u s unemployment"`.
pub fn normalize_text(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity in `[0, 1]` between two normalized strings: the better of
/// character edit similarity and token-set overlap.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_damerau_levenshtein(a, b).max(token_jaccard(a, b))
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = a.split(' ').collect();
    let right: BTreeSet<&str> = b.split(' ').collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Whether `phrase` occurs in `text` on word boundaries. Both normalized.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    format!(" {} ", text).contains(&format!(" {} ", phrase))
}

/// Whether `token` occurs in `text` only glued to other characters
/// ("m2" inside "cm2"), never as a word of its own.
pub fn embedded_only(text: &str, token: &str) -> bool {
    text.contains(token) && !contains_phrase(text, token)
}
