//! C3 — Jaccard (word-set, stop-word filtered) and Dice (bigram-multiset)
//! similarity metrics; composite = max of the two.

use std::collections::HashSet;

use crate::normalize::normalize_title;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "be", "is", "are", "will", "of", "in", "on", "to", "for", "by", "at",
    "that", "this", "it", "and", "or", "if",
];

fn tokenize(title: &str, current_year: i32) -> HashSet<String> {
    normalize_title(title, current_year)
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Tokenize each title by whitespace after `normalize_title`, remove the
/// stop-word set, take intersection/union sizes. Both-empty => 1;
/// exactly-one-empty => 0.
pub fn jaccard(a: &str, b: &str, current_year: i32) -> f64 {
    let set_a = tokenize(a, current_year);
    let set_b = tokenize(b, current_year);

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

fn bigrams(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < 2 {
        return Vec::new();
    }
    chars.windows(2).map(|w| w.iter().collect()).collect()
}

/// Character bigram multiset of each string (length >= 2; else 0):
/// `2*|A∩B| / (|A|+|B|)` using multiset cardinality (repeated bigrams
/// counted).
pub fn dice(a: &str, b: &str) -> f64 {
    let bigrams_a = bigrams(a);
    let bigrams_b = bigrams(b);

    if bigrams_a.is_empty() || bigrams_b.is_empty() {
        return 0.0;
    }

    let mut counts_b: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for bg in &bigrams_b {
        *counts_b.entry(bg.as_str()).or_insert(0) += 1;
    }

    let mut overlap = 0usize;
    for bg in &bigrams_a {
        if let Some(count) = counts_b.get(bg.as_str()) {
            if *count > 0 {
                overlap += 1;
                counts_b.insert(bg.as_str(), count - 1);
            }
        }
    }

    (2.0 * overlap as f64) / (bigrams_a.len() + bigrams_b.len()) as f64
}

/// `max(jaccard, dice)` on titles already passed through `normalize_title`
/// (jaccard tokenizes internally from the raw title; dice operates on the
/// normalized string directly since it is character-based).
pub fn composite(a: &str, b: &str, current_year: i32) -> f64 {
    let norm_a = normalize_title(a, current_year);
    let norm_b = normalize_title(b, current_year);
    jaccard(a, b, current_year).max(dice(&norm_a, &norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_ignores_stop_word_the() {
        assert_eq!(jaccard("will the lakers win", "will lakers win", 2026), 1.0);
    }

    #[test]
    fn dice_identical_strings_is_one() {
        assert_eq!(dice("aaa", "aaa"), 1.0);
    }

    #[test]
    fn dice_single_char_is_zero() {
        assert_eq!(dice("a", "a"), 0.0);
    }

    #[test]
    fn composite_is_bounded_and_symmetric() {
        let a = "Will BTC hit $100k?";
        let b = "Bitcoin to 100k?";
        let ab = composite(a, b, 2026);
        let ba = composite(b, a, 2026);
        assert!((0.0..=1.0).contains(&ab));
        assert_eq!(ab, ba);
    }
}
