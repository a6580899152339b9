//! C8 — spread detection. For every fingerprint with fresh quotes from at
//! least two venues, evaluate both directions (buy YES on A / NO on B, and
//! the mirror) and keep whichever clears the configured thresholds, ranked
//! by estimated profit.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::Config;
use crate::quotes::store::QuoteStore;
use crate::types::{ArbitOpportunity, MarketQuote};

/// One buy-YES-on-A / buy-NO-on-B pairing between two venue quotes for the
/// same fingerprint.
struct Candidate<'a> {
    a: &'a MarketQuote,
    b: &'a MarketQuote,
}

pub async fn scan(store: &QuoteStore, config: &Config) -> Vec<ArbitOpportunity> {
    let mut opportunities = Vec::new();

    for fingerprint in store.fingerprints().await {
        let quotes = store.fresh_quotes(&fingerprint, config.freshness_max_secs).await;
        if quotes.len() < 2 {
            continue;
        }

        // Unordered venue pairs only: each pair considers both direction
        // configurations (buy YES on A/NO on B, and the mirror) and keeps
        // whichever clears the configured thresholds.
        for i in 0..quotes.len() {
            for j in (i + 1)..quotes.len() {
                let forward = Candidate { a: &quotes[i], b: &quotes[j] };
                let reverse = Candidate { a: &quotes[j], b: &quotes[i] };
                if let Some(opp) = best_candidate(&forward, &reverse, config) {
                    opportunities.push(opp);
                }
            }
        }
    }

    opportunities.sort_by(|a, b| {
        b.est_profit
            .cmp(&a.est_profit)
            .then(b.spread_bps.cmp(&a.spread_bps))
            .then(b.quoted_at.cmp(&a.quoted_at))
    });

    opportunities
}

/// Evaluate both direction configurations for one venue pair (ignoring
/// thresholds) and keep the one with the greater `spreadBps`, then apply
/// the filter/size pipeline to that single chosen candidate.
fn best_candidate(forward: &Candidate, reverse: &Candidate, config: &Config) -> Option<ArbitOpportunity> {
    let forward_spread = raw_spread_bps(forward);
    let reverse_spread = raw_spread_bps(reverse);
    let chosen = if reverse_spread > forward_spread { reverse } else { forward };
    evaluate(chosen, config)
}

fn raw_spread_bps(candidate: &Candidate) -> i64 {
    let total_cost = candidate.a.yes_price + candidate.b.no_price;
    let gross = ((Decimal::ONE - total_cost) * dec!(10_000)).round();
    let gross_bps = gross.to_string().parse::<i64>().unwrap_or(i64::MIN);
    gross_bps - candidate.a.fee_bps as i64 - candidate.b.fee_bps as i64
}

/// Buy YES on `candidate.a`, buy NO on `candidate.b`. The guaranteed payout
/// per share is always 1 unit: exactly one of YES/NO resolves true.
fn evaluate(candidate: &Candidate, config: &Config) -> Option<ArbitOpportunity> {
    let a = candidate.a;
    let b = candidate.b;

    let total_cost = a.yes_price + b.no_price;
    let guaranteed_payout = Decimal::ONE;
    if total_cost >= guaranteed_payout {
        return None;
    }

    let gross_spread_bps = ((guaranteed_payout - total_cost) * dec!(10_000))
        .round()
        .to_string()
        .parse::<i64>()
        .unwrap_or(0);
    let spread_bps = gross_spread_bps - a.fee_bps as i64 - b.fee_bps as i64;

    if spread_bps < config.min_spread_bps || spread_bps > config.max_spread_bps {
        return None;
    }

    let liquidity_a = a.yes_liquidity;
    let liquidity_b = b.no_liquidity;
    let min_liquidity = liquidity_a.min(liquidity_b);
    if min_liquidity < config.min_liquidity {
        return None;
    }

    // maxShares = min(liquidityA, liquidityB) / max(yesPrice, noPrice):
    // liquidities are USDT notional, so converting to a share count divides
    // by the larger of the two leg prices (the binding notional-per-share).
    let touch_price = a.yes_price.max(b.no_price);
    if touch_price <= Decimal::ZERO {
        return None;
    }
    let max_shares_by_liquidity = min_liquidity / touch_price;
    let max_shares_by_budget = if total_cost > Decimal::ZERO {
        config.max_position_size / total_cost
    } else {
        Decimal::ZERO
    };
    let shares = max_shares_by_liquidity.min(max_shares_by_budget);
    if shares <= Decimal::ZERO {
        return None;
    }

    // Per-share fee fraction, applied to the notional of one share — not
    // scaled by the share count.
    let fees_deducted = Decimal::from(a.fee_bps + b.fee_bps) / dec!(10_000);
    let est_profit = shares * Decimal::from(spread_bps) / dec!(10_000);

    let polarity_flip = a.outcome_labels.is_some()
        && b.outcome_labels.is_some()
        && a.outcome_labels != b.outcome_labels;

    Some(ArbitOpportunity {
        market_id: a.market_id.clone(),
        protocol_a: a.protocol,
        protocol_b: b.protocol,
        buy_yes_on_a: true,
        yes_price_a: a.yes_price,
        no_price_b: b.no_price,
        total_cost,
        guaranteed_payout,
        spread_bps,
        gross_spread_bps,
        fees_deducted,
        est_profit,
        liquidity_a,
        liquidity_b,
        polarity_flip,
        quoted_at: a.quoted_at.min(b.quoted_at),
        shares,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Fingerprint, Platform};
    use chrono::Utc;

    fn quote(protocol: Platform, yes_price: Decimal, no_price: Decimal, fee_bps: u32) -> MarketQuote {
        MarketQuote {
            market_id: Fingerprint::new("fp-scenario-6"),
            protocol,
            yes_price,
            no_price,
            yes_liquidity: dec!(1_000_000_000),
            no_liquidity: dec!(1_000_000_000),
            fee_bps,
            quoted_at: Utc::now(),
            title: None,
            outcome_labels: None,
        }
    }

    #[test]
    fn scenario_6_spread_after_fees() {
        let config = Config::default();
        let a = quote(Platform::Predict, dec!(0.55), dec!(0.50), 200);
        let b = quote(Platform::Probable, dec!(0.50), dec!(0.40), 175);
        let candidate = Candidate { a: &a, b: &b };

        let opp = evaluate(&candidate, &config).expect("should produce an opportunity");
        assert_eq!(opp.total_cost, dec!(0.95));
        assert_eq!(opp.gross_spread_bps, 500);
        assert_eq!(opp.spread_bps, 125);
        assert!(opp.est_profit > Decimal::ZERO);
    }

    #[test]
    fn below_min_spread_is_filtered() {
        let mut config = Config::default();
        config.min_spread_bps = 1_000;
        let a = quote(Platform::Predict, dec!(0.55), dec!(0.50), 200);
        let b = quote(Platform::Probable, dec!(0.50), dec!(0.40), 175);
        let candidate = Candidate { a: &a, b: &b };
        assert!(evaluate(&candidate, &config).is_none());
    }

    #[test]
    fn below_min_liquidity_is_filtered() {
        let mut config = Config::default();
        config.min_liquidity = dec!(2_000_000_000);
        let a = quote(Platform::Predict, dec!(0.55), dec!(0.50), 200);
        let b = quote(Platform::Probable, dec!(0.50), dec!(0.40), 175);
        let candidate = Candidate { a: &a, b: &b };
        assert!(evaluate(&candidate, &config).is_none());
    }

    #[test]
    fn shares_capped_by_max_position_size() {
        let config = Config::default();
        let a = quote(Platform::Predict, dec!(0.55), dec!(0.50), 200);
        let b = quote(Platform::Probable, dec!(0.50), dec!(0.40), 175);
        let candidate = Candidate { a: &a, b: &b };
        let opp = evaluate(&candidate, &config).unwrap();
        assert!(opp.shares <= config.max_position_size / opp.total_cost);
    }

    #[test]
    fn best_candidate_picks_the_more_profitable_direction() {
        let config = Config::default();
        // Forward (buy YES on a, NO on b): 0.55 + 0.40 = 0.95 -> gross 500bps.
        // Reverse (buy YES on b, NO on a): 0.50 + 0.50 = 1.00 -> no arbitrage.
        let a = quote(Platform::Predict, dec!(0.55), dec!(0.50), 200);
        let b = quote(Platform::Probable, dec!(0.50), dec!(0.40), 175);
        let forward = Candidate { a: &a, b: &b };
        let reverse = Candidate { a: &b, b: &a };
        let opp = best_candidate(&forward, &reverse, &config).expect("forward direction should win");
        assert_eq!(opp.protocol_a, Platform::Predict);
        assert_eq!(opp.protocol_b, Platform::Probable);
    }

    #[test]
    fn quoted_at_is_the_minimum_of_the_two_legs() {
        let config = Config::default();
        let mut a = quote(Platform::Predict, dec!(0.55), dec!(0.50), 200);
        let mut b = quote(Platform::Probable, dec!(0.50), dec!(0.40), 175);
        a.quoted_at = Utc::now();
        b.quoted_at = Utc::now() - chrono::Duration::seconds(5);
        let candidate = Candidate { a: &a, b: &b };
        let opp = evaluate(&candidate, &config).unwrap();
        assert_eq!(opp.quoted_at, b.quoted_at);
    }
}
