//! C4 — the heart of the system: a deterministic three-pass cross-venue
//! market matcher with false-positive guards.

use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::normalize::normalize_category;
use crate::polarity::detect_polarity;
use crate::similarity::composite;
use crate::template::extract_template;
use crate::types::{MarketInput, MatchResult, MatchType};

pub const TEMPORAL_WINDOW_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Given two lists `a`, `b` of `MarketInput`, produce `MatchResult`s via the
/// three-pass algorithm. Each `a` and each `b` appears in at most one
/// result; a pair reported in an earlier pass is never reconsidered by a
/// later pass. `config.matching_similarity_threshold` gates Pass 3's
/// similarity guard and `config.matching_confidence_threshold` gates
/// whether a detected polarity flip is trusted.
pub fn match_markets(
    a: &[MarketInput],
    b: &[MarketInput],
    current_year: i32,
    config: &Config,
) -> Vec<MatchResult> {
    let mut results = Vec::new();
    let mut used_a: HashSet<usize> = HashSet::new();
    let mut used_b: HashSet<usize> = HashSet::new();

    pass1_condition_id(a, b, config, &mut used_a, &mut used_b, &mut results);
    pass2_template_match(a, b, current_year, config, &mut used_a, &mut used_b, &mut results);
    pass3_similarity_fallback(a, b, current_year, config, &mut used_a, &mut used_b, &mut results);

    results
}

fn push_match(
    a: &MarketInput,
    b: &MarketInput,
    match_type: MatchType,
    similarity: f64,
    config: &Config,
    results: &mut Vec<MatchResult>,
) {
    let polarity = detect_polarity(&a.title, &b.title, None, None);
    let polarity_flip = polarity.polarity_flip && polarity.confidence >= config.matching_confidence_threshold;
    results.push(MatchResult {
        market_a: a.clone(),
        market_b: b.clone(),
        match_type,
        similarity,
        polarity_flip,
    });
}

fn pass1_condition_id(
    a: &[MarketInput],
    b: &[MarketInput],
    config: &Config,
    used_a: &mut HashSet<usize>,
    used_b: &mut HashSet<usize>,
    results: &mut Vec<MatchResult>,
) {
    let a_has_any = a.iter().any(|m| non_empty(&m.condition_id));
    let b_has_any = b.iter().any(|m| non_empty(&m.condition_id));
    if !a_has_any || !b_has_any {
        return;
    }

    // Build conditionId -> first A index, first occurrence wins.
    let mut by_condition: HashMap<&str, usize> = HashMap::new();
    for (i, m) in a.iter().enumerate() {
        if let Some(cid) = m.condition_id.as_deref() {
            if !cid.is_empty() {
                by_condition.entry(cid).or_insert(i);
            }
        }
    }

    for (j, mb) in b.iter().enumerate() {
        let Some(cid) = mb.condition_id.as_deref() else {
            continue;
        };
        if cid.is_empty() {
            continue;
        }
        let Some(&i) = by_condition.get(cid) else {
            continue;
        };
        if used_a.contains(&i) || used_b.contains(&j) {
            continue;
        }
        push_match(&a[i], mb, MatchType::ConditionId, 1.0, config, results);
        used_a.insert(i);
        used_b.insert(j);
    }
}

fn non_empty(s: &Option<String>) -> bool {
    s.as_deref().map(|v| !v.is_empty()).unwrap_or(false)
}

fn pass2_template_match(
    a: &[MarketInput],
    b: &[MarketInput],
    current_year: i32,
    config: &Config,
    used_a: &mut HashSet<usize>,
    used_b: &mut HashSet<usize>,
    results: &mut Vec<MatchResult>,
) {
    // Multimap of B by template key, derived fresh per B element.
    let mut b_by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for (j, mb) in b.iter().enumerate() {
        if used_b.contains(&j) {
            continue;
        }
        if let Some(tpl) = extract_template(&mb.title, current_year) {
            b_by_key.entry(tpl.key()).or_default().push(j);
        }
    }

    for (i, ma) in a.iter().enumerate() {
        if used_a.contains(&i) {
            continue;
        }
        let Some(tpl_a) = extract_template(&ma.title, current_year) else {
            continue;
        };
        let key = tpl_a.key();
        let Some(candidates) = b_by_key.get(&key) else {
            continue;
        };
        let Some(&j) = candidates.iter().find(|j| !used_b.contains(*j)) else {
            continue;
        };
        push_match(ma, &b[j], MatchType::TemplateMatch, 1.0, config, results);
        used_a.insert(i);
        used_b.insert(j);
    }
}

fn pass3_similarity_fallback(
    a: &[MarketInput],
    b: &[MarketInput],
    current_year: i32,
    config: &Config,
    used_a: &mut HashSet<usize>,
    used_b: &mut HashSet<usize>,
    results: &mut Vec<MatchResult>,
) {
    // surviving[i] = Vec<(j, sim)> of candidates for a[i] that pass all guards.
    let mut surviving: Vec<Vec<(usize, f64)>> = vec![Vec::new(); a.len()];

    for (i, ma) in a.iter().enumerate() {
        if used_a.contains(&i) {
            continue;
        }
        let tpl_a = extract_template(&ma.title, current_year);
        let cat_a = normalize_category(&ma.category);

        for (j, mb) in b.iter().enumerate() {
            if used_b.contains(&j) {
                continue;
            }

            // Guard 1: template guard.
            if let Some(ref t_a) = tpl_a {
                if let Some(t_b) = extract_template(&mb.title, current_year) {
                    if t_a.template == t_b.template {
                        continue;
                    }
                }
            }

            // Guard 2: category filter.
            let cat_b = normalize_category(&mb.category);
            if let (Some(ca), Some(cb)) = (&cat_a, &cat_b) {
                if ca != cb {
                    continue;
                }
            }

            // Guard 3: temporal filter.
            if let (Some(ra), Some(rb)) = (ma.resolves_at, mb.resolves_at) {
                if (ra - rb).abs() > TEMPORAL_WINDOW_MS {
                    continue;
                }
            }

            // Guard 4: similarity threshold.
            let sim = composite(&ma.title, &mb.title, current_year);
            if sim < config.matching_similarity_threshold {
                continue;
            }

            surviving[i].push((j, sim));
        }
    }

    // Stable one-to-one selection: iterate A in input order; for each A take
    // its highest-sim surviving B still unmatched; ties broken by B input
    // order.
    for (i, ma) in a.iter().enumerate() {
        if used_a.contains(&i) {
            continue;
        }
        let mut best: Option<(usize, f64)> = None;
        for &(j, sim) in &surviving[i] {
            if used_b.contains(&j) {
                continue;
            }
            match best {
                None => best = Some((j, sim)),
                Some((best_j, best_sim)) => {
                    if sim > best_sim || (sim == best_sim && j < best_j) {
                        best = Some((j, sim));
                    }
                }
            }
        }
        if let Some((j, sim)) = best {
            push_match(ma, &b[j], MatchType::TitleSimilarity, sim, config, results);
            used_a.insert(i);
            used_b.insert(j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::default()
    }

    fn market(id: &str, title: &str) -> MarketInput {
        MarketInput {
            id: id.to_string(),
            title: title.to_string(),
            condition_id: None,
            category: None,
            resolves_at: None,
        }
    }

    fn market_with_condition(id: &str, title: &str, cid: &str) -> MarketInput {
        let mut m = market(id, title);
        m.condition_id = Some(cid.to_string());
        m
    }

    #[test]
    fn scenario_1_condition_id_match() {
        let a = vec![market_with_condition("a1", "Will BTC hit 100k?", "c-1")];
        let b = vec![market_with_condition("b1", "Bitcoin to 100k?", "c-1")];
        let results = match_markets(&a, &b, 2026, &config());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_type, MatchType::ConditionId);
        assert_eq!(results[0].similarity, 1.0);
        assert!(!results[0].polarity_flip);
    }

    #[test]
    fn scenario_2_template_equality_overrides_prose() {
        let a = vec![market_with_condition(
            "a1",
            "Will Solana FDV be above $100B?",
            "a",
        )];
        let b = vec![market_with_condition(
            "b1",
            "Will Solana FDV be above $100B?",
            "b",
        )];
        let results = match_markets(&a, &b, 2026, &config());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_type, MatchType::TemplateMatch);
    }

    #[test]
    fn scenario_3_template_guard_blocks() {
        let a = vec![market("a1", "Will Solana FDV be above $50B?")];
        let b = vec![market("b1", "Will Solana FDV be above $100B?")];
        let results = match_markets(&a, &b, 2026, &config());
        assert_eq!(results.len(), 0);
    }

    #[test]
    fn scenario_4_id_collision_safety() {
        let a = vec![market(
            "500",
            "Will Base launch a token by June 30, 2026?",
        )];
        let b = vec![
            market("500", "Opensea FDV above $500M one day after launch?"),
            market("501", "Will Theo launch a token by March 31, 2026?"),
        ];
        let results = match_markets(&a, &b, 2026, &config());
        assert_eq!(results.len(), 0);
    }

    #[test]
    fn scenario_5_magnitude_normalization() {
        let a = vec![market(
            "a1",
            "EdgeX FDV above $4B one day after launch?",
        )];
        let b = vec![market(
            "b1",
            "EdgeX FDV above $4,000,000,000 one day after launch?",
        )];
        let results = match_markets(&a, &b, 2026, &config());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_type, MatchType::TemplateMatch);
    }

    #[test]
    fn each_side_appears_at_most_once() {
        let a = vec![
            market_with_condition("a1", "X?", "c-1"),
            market("a2", "Will BTC hit 100k?"),
        ];
        let b = vec![
            market_with_condition("b1", "Y?", "c-1"),
            market("b2", "Bitcoin to 100k soon?"),
        ];
        let results = match_markets(&a, &b, 2026, &config());
        let mut seen_a = HashSet::new();
        let mut seen_b = HashSet::new();
        for r in &results {
            assert!(seen_a.insert(r.market_a.id.clone()));
            assert!(seen_b.insert(r.market_b.id.clone()));
        }
    }

    #[test]
    fn idempotent_on_repeated_runs() {
        let a = vec![market("a1", "Will BTC hit 100k?"), market("a2", "Will ETH hit 5k?")];
        let b = vec![market("b1", "Bitcoin to 100k?"), market("b2", "Ethereum to 5k?")];
        let first = match_markets(&a, &b, 2026, &config());
        let second = match_markets(&a, &b, 2026, &config());
        assert_eq!(first.len(), second.len());
        for (x, y) in first.iter().zip(second.iter()) {
            assert_eq!(x.market_a.id, y.market_a.id);
            assert_eq!(x.market_b.id, y.market_b.id);
            assert_eq!(x.similarity, y.similarity);
        }
    }
}
