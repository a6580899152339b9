//! C2 — Regex-based extraction of `{template, entity, params}` from a
//! market title. A fixed, ordered, append-only registry; first match wins.

use std::sync::OnceLock;

use regex::Regex;

use crate::normalize::{normalize_entity, normalize_params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTemplate {
    pub template: &'static str,
    pub entity: String,
    pub params: String,
}

impl ExtractedTemplate {
    /// The composite key Pass 2 of the matching engine buckets on.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.template, self.entity, self.params)
    }
}

struct TemplateSpec {
    name: &'static str,
    pattern: &'static str,
}

/// Order is the contract: the first matching pattern wins, and new entries
/// must only ever be appended so existing test guards remain valid.
const REGISTRY: &[TemplateSpec] = &[
    TemplateSpec {
        name: "fdv-above",
        pattern: r"(?i)^(?:will\s+)?(?P<entity>.+?)\s+fdv\s+(?:be\s+)?above\s+(?P<params>.+?)\??$",
    },
    TemplateSpec {
        name: "mcap-above",
        pattern: r"(?i)^(?:will\s+)?(?P<entity>.+?)\s+(?:market\s*cap|mcap)\s+(?:be\s+)?above\s+(?P<params>.+?)\??$",
    },
    TemplateSpec {
        name: "price-target",
        pattern: r"(?i)^(?:will\s+)?(?P<entity>.+?)\s+(?:hit|reach|be\s+above|go\s+above)\s+(?P<params>.+?)\??$",
    },
    TemplateSpec {
        name: "token-launch",
        pattern: r"(?i)^(?:will\s+)?(?P<entity>.+?)\s+launch\s+a?\s*token\s+by\s+(?P<params>.+?)\??$",
    },
    TemplateSpec {
        name: "list-on",
        pattern: r"(?i)^(?:will\s+)?(?P<entity>.+?)\s+(?:be\s+)?list(?:ed)?\s+on\s+(?P<params>.+?)\??$",
    },
    TemplateSpec {
        name: "approved-by",
        pattern: r"(?i)^(?:will\s+)?(?P<entity>.+?)\s+(?:be\s+)?approved\s+by\s+(?P<params>.+?)\??$",
    },
    TemplateSpec {
        name: "partner-with",
        pattern: r"(?i)^(?:will\s+)?(?P<entity>.+?)\s+partner\s+with\s+(?P<params>.+?)\??$",
    },
    TemplateSpec {
        name: "elected-to",
        pattern: r"(?i)^(?:will\s+)?(?P<entity>.+?)\s+(?:be\s+)?elected\s+(?:to|as)\s+(?P<params>.+?)\??$",
    },
    TemplateSpec {
        name: "happen-by",
        pattern: r"(?i)^(?:will\s+)?(?P<entity>.+?)\s+happen\s+by\s+(?P<params>.+?)\??$",
    },
    TemplateSpec {
        name: "out-as",
        pattern: r"(?i)^(?:will\s+)?(?P<entity>.+?)\s+(?:step\s+down|depart|be\s+out)\s+as\s+(?P<params>.+?)\??$",
    },
];

fn compiled() -> &'static Vec<Regex> {
    static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        REGISTRY
            .iter()
            .map(|spec| Regex::new(spec.pattern).expect("template registry regex must compile"))
            .collect()
    })
}

/// Extract `{template, entity, params}` from a raw (not yet normalized)
/// market title. Returns `None` if no registered pattern matches.
pub fn extract_template(title: &str, current_year: i32) -> Option<ExtractedTemplate> {
    let regexes = compiled();
    for (spec, re) in REGISTRY.iter().zip(regexes.iter()) {
        if let Some(caps) = re.captures(title.trim()) {
            let raw_entity = caps.name("entity").map(|m| m.as_str()).unwrap_or_default();
            let raw_params = caps.name("params").map(|m| m.as_str()).unwrap_or_default();
            return Some(ExtractedTemplate {
                template: spec.name,
                entity: normalize_entity(raw_entity),
                params: normalize_params(raw_params, current_year),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fdv_above_matches() {
        let t = extract_template("Will Solana FDV be above $100B?", 2026).unwrap();
        assert_eq!(t.template, "fdv-above");
        assert_eq!(t.entity, "solana");
        assert_eq!(t.params, "100000000000");
    }

    #[test]
    fn magnitude_variants_produce_same_key() {
        let a = extract_template("EdgeX FDV above $4B one day after launch?", 2026).unwrap();
        let b = extract_template("EdgeX FDV above $4,000,000,000 one day after launch?", 2026).unwrap();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn token_launch_matches() {
        let t = extract_template("Will Base launch a token by June 30, 2026?", 2026).unwrap();
        assert_eq!(t.template, "token-launch");
        assert_eq!(t.entity, "base");
    }

    #[test]
    fn no_match_returns_none() {
        assert!(extract_template("Who will win the 2026 World Cup?", 2026).is_none());
    }

    #[test]
    fn registry_order_is_fdv_before_price_target() {
        // "FDV be above" must not be captured by the looser price-target
        // pattern first, since fdv-above is registered earlier.
        let t = extract_template("Will Solana FDV be above $50B?", 2026).unwrap();
        assert_eq!(t.template, "fdv-above");
    }
}
