//! C4.5 — Polarity detection: decides whether two matched titles describe
//! complementary (YES/NO-flipped) outcomes rather than the same outcome.

use std::sync::OnceLock;

use regex::Regex;

const NEGATION_WORDS: &[&str] = &["not", "won't", "will not", "no"];

const ANTONYM_CLASSES: &[(&str, &str)] = &[
    ("above", "below"),
    ("over", "under"),
    ("more", "less"),
    ("before", "after"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarityResult {
    pub polarity_flip: bool,
    pub confidence: f64,
}

fn word_regex(word: &str) -> Regex {
    let escaped = regex::escape(word);
    Regex::new(&format!(r"(?i)\b{escaped}\b")).expect("word regex always valid")
}

fn contains_word(haystack: &str, word: &str) -> bool {
    word_regex(word).is_match(haystack)
}

fn negation_words_regex() -> &'static Vec<Regex> {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| NEGATION_WORDS.iter().map(|w| word_regex(w)).collect())
}

fn title_has_negation(title: &str) -> bool {
    negation_words_regex().iter().any(|re| re.is_match(title))
}

/// Numeric anchor extraction: the first digit run in the title, used to
/// confirm the two antonym mentions refer to the same quantity.
fn numeric_anchor(title: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[\d,]+\.?\d*").unwrap());
    re.find(title).map(|m| m.as_str().replace(',', ""))
}

pub fn detect_polarity(
    title_a: &str,
    title_b: &str,
    outcome_labels_a: Option<&[String; 2]>,
    outcome_labels_b: Option<&[String; 2]>,
) -> PolarityResult {
    if let (Some(a), Some(b)) = (outcome_labels_a, outcome_labels_b) {
        if a[0].eq_ignore_ascii_case(&b[1]) && a[1].eq_ignore_ascii_case(&b[0]) {
            return PolarityResult {
                polarity_flip: true,
                confidence: 0.95,
            };
        }
    }

    let negation_a = title_has_negation(title_a);
    let negation_b = title_has_negation(title_b);
    if negation_a != negation_b {
        return PolarityResult {
            polarity_flip: true,
            confidence: 0.85,
        };
    }

    for (word_pos, word_neg) in ANTONYM_CLASSES {
        let a_has_pos = contains_word(title_a, word_pos);
        let a_has_neg = contains_word(title_a, word_neg);
        let b_has_pos = contains_word(title_b, word_pos);
        let b_has_neg = contains_word(title_b, word_neg);

        let asymmetric = (a_has_pos && b_has_neg && !a_has_neg && !b_has_pos)
            || (a_has_neg && b_has_pos && !a_has_pos && !b_has_neg);

        if asymmetric {
            let same_anchor = match (numeric_anchor(title_a), numeric_anchor(title_b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            };
            if same_anchor {
                return PolarityResult {
                    polarity_flip: true,
                    confidence: 0.70,
                };
            }
        }
    }

    PolarityResult {
        polarity_flip: false,
        confidence: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels_flip_overrides_titles() {
        let labels_a = ["Yes".to_string(), "No".to_string()];
        let labels_b = ["No".to_string(), "Yes".to_string()];
        let result = detect_polarity(
            "Will X happen?",
            "Will X happen?",
            Some(&labels_a),
            Some(&labels_b),
        );
        assert!(result.polarity_flip);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn asymmetric_negation_detected() {
        let result = detect_polarity("Will BTC hit 100k?", "BTC will not hit 100k", None, None);
        assert!(result.polarity_flip);
        assert_eq!(result.confidence, 0.85);
    }

    #[test]
    fn antonym_pair_on_same_anchor_detected() {
        let result = detect_polarity(
            "Will ETH be above 5000 by June?",
            "Will ETH be below 5000 by June?",
            None,
            None,
        );
        assert!(result.polarity_flip);
        assert_eq!(result.confidence, 0.70);
    }

    #[test]
    fn no_polarity_signal_is_false() {
        let result = detect_polarity("Will BTC hit 100k?", "Bitcoin to 100k?", None, None);
        assert!(!result.polarity_flip);
        assert_eq!(result.confidence, 0.0);
    }
}
