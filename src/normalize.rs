//! C1 — Unicode, punctuation, year, and magnitude canonicalization of
//! titles/entities/params. Pure functions, all producing lowercase ASCII.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Visually-similar codepoints mapped to their ASCII look-alike.
const CONFUSABLES: &[(char, char)] = &[
    ('А', 'A'), ('В', 'B'), ('Е', 'E'), ('К', 'K'), ('М', 'M'),
    ('Н', 'H'), ('О', 'O'), ('Р', 'P'), ('С', 'C'), ('Т', 'T'),
    ('Х', 'X'), ('а', 'a'), ('е', 'e'), ('о', 'o'), ('р', 'p'),
    ('с', 'c'), ('у', 'y'), ('х', 'x'), ('и', 'n'),
    ('Α', 'A'), ('Β', 'B'), ('Ε', 'E'), ('Ζ', 'Z'), ('Η', 'H'),
    ('Ι', 'I'), ('Κ', 'K'), ('Μ', 'M'), ('Ν', 'N'), ('Ο', 'O'),
    ('Ρ', 'P'), ('Τ', 'T'), ('Υ', 'Y'), ('Χ', 'X'),
    ('Ʌ', 'A'), ('Ͻ', 'N'),
];

pub fn replace_confusables(s: &str) -> String {
    s.chars()
        .map(|c| {
            CONFUSABLES
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

fn magnitude_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d[\d,]*\.?\d*)(?:\s*(k|m|b|thousand|million|billion)\b)?").unwrap()
    })
}

/// Rewrites `"4B" | "4 billion" | "500M" | "10k" | "1.5 million"` to the
/// decimal integer string (`"4000000000"`). Decimals floor the multiplied
/// value. Pure digit sequences (with or without comma grouping) are
/// stripped of commas but otherwise left as-is.
pub fn normalize_magnitude(s: &str) -> String {
    let re = magnitude_regex();
    re.replace_all(s, |caps: &regex::Captures| {
        let raw = caps[1].replace(',', "");
        let Some(suffix_match) = caps.get(2) else {
            return raw;
        };
        let value: f64 = match raw.parse() {
            Ok(v) => v,
            Err(_) => return caps[0].to_string(),
        };
        let suffix = suffix_match.as_str().to_lowercase();
        let multiplier: f64 = match suffix.as_str() {
            "k" | "thousand" => 1_000.0,
            "m" | "million" => 1_000_000.0,
            "b" | "billion" => 1_000_000_000.0,
            _ => 1.0,
        };
        let scaled = (value * multiplier).floor();
        format!("{scaled:.0}")
    })
    .into_owned()
}

fn word_boundary_year_regex(year: i32) -> Regex {
    Regex::new(&format!(r"(?i)\b{year}\b")).expect("year regex always valid")
}

/// `confusable-replace -> NFKD decompose and strip combining marks ->
/// lowercase -> strip "$?," digit separators -> delete standalone token
/// equal to current year (word-boundary match only) -> collapse whitespace
/// -> trim`.
pub fn normalize_title(s: &str, current_year: i32) -> String {
    let confusables_replaced = replace_confusables(s);
    let decomposed: String = confusables_replaced.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = decomposed.to_lowercase();
    let stripped: String = lowered.chars().filter(|c| *c != '$' && *c != '?' && *c != ',').collect();
    let year_re = word_boundary_year_regex(current_year);
    let year_removed = year_re.replace_all(&stripped, "").into_owned();
    collapse_whitespace(&year_removed)
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

const LEADING_ARTICLES: &[&str] = &["the", "a", "an"];

/// Lowercase, trim, drop trailing `.!?`, drop leading articles.
pub fn normalize_entity(s: &str) -> String {
    let lowered = s.trim().to_lowercase();
    let without_trailing = lowered.trim_end_matches(|c| c == '.' || c == '!' || c == '?');
    let mut tokens: Vec<&str> = without_trailing.split_whitespace().collect();
    if let Some(first) = tokens.first() {
        if LEADING_ARTICLES.contains(first) {
            tokens.remove(0);
        }
    }
    tokens.join(" ").trim().to_string()
}

/// Strip `$?`, magnitude-normalize, drop current-year token, collapse
/// whitespace.
pub fn normalize_params(s: &str, current_year: i32) -> String {
    let stripped: String = s.chars().filter(|c| *c != '$' && *c != '?').collect();
    let magnitude_normalized = normalize_magnitude(&stripped);
    let year_re = word_boundary_year_regex(current_year);
    let year_removed = year_re.replace_all(&magnitude_normalized, "").into_owned();
    collapse_whitespace(&year_removed).to_lowercase()
}

/// Lowercases, trims, and maps a fixed synonym set to a canonical category
/// form (used by C4 Pass 3's category filter).
pub fn normalize_category(s: &Option<String>) -> Option<String> {
    let raw = s.as_ref()?.trim().to_lowercase();
    if raw.is_empty() {
        return None;
    }
    let canon = match raw.as_str() {
        "crypto" | "cryptocurrency" | "defi" => "crypto",
        "politics" | "political" | "elections" | "election" => "politics",
        other => return Some(other.to_string()),
    };
    Some(canon.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusables_are_replaced() {
        assert_eq!(replace_confusables("СATch"), "CATch");
    }

    #[test]
    fn magnitude_variants_normalize_to_same_integer() {
        assert_eq!(normalize_magnitude("$4B"), "$4000000000");
        assert_eq!(normalize_magnitude("4 billion"), "4000000000");
        assert_eq!(normalize_magnitude("$4,000,000,000"), "$4000000000");
        assert_eq!(normalize_magnitude("500M"), "500000000");
        assert_eq!(normalize_magnitude("10k"), "10000");
        assert_eq!(normalize_magnitude("1.5 million"), "1500000");
    }

    #[test]
    fn pure_digits_untouched() {
        assert_eq!(normalize_magnitude("12345"), "12345");
    }

    #[test]
    fn title_pipeline_strips_year_and_punctuation() {
        let out = normalize_title("Will BTC hit $100,000 in 2026?", 2026);
        assert!(!out.contains("2026"));
        assert!(!out.contains(','));
        assert!(!out.contains('$'));
        assert_eq!(out, out.to_lowercase());
    }

    #[test]
    fn entity_drops_leading_article_and_trailing_punct() {
        assert_eq!(normalize_entity("The Lakers!"), "lakers");
        assert_eq!(normalize_entity("an Opensea"), "opensea");
    }

    #[test]
    fn params_normalize_magnitude_and_year() {
        assert_eq!(normalize_params("$4B in 2026", 2026), "4000000000 in");
    }

    #[test]
    fn category_synonyms_canonicalize() {
        assert_eq!(
            normalize_category(&Some("Cryptocurrency".into())),
            Some("crypto".into())
        );
        assert_eq!(
            normalize_category(&Some("Elections".into())),
            Some("politics".into())
        );
        assert_eq!(normalize_category(&None), None);
    }
}
