//! Cross-venue discovery: fetch each venue's open-market catalog
//! (tolerating a single venue being down), match them pairwise, and
//! publish a fingerprint-keyed view of the combined catalog.

pub mod opinion;
pub mod predict;
pub mod probable;

use std::collections::HashMap;

use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::matching::match_markets;
use crate::types::{DiscoveredMarket, Fingerprint, MarketInput, Platform};

/// Per-venue catalogs plus the fingerprint assignment each market was
/// given during cross-venue matching.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    pub predict: HashMap<Fingerprint, DiscoveredMarket>,
    pub probable: HashMap<Fingerprint, DiscoveredMarket>,
    pub opinion: HashMap<Fingerprint, DiscoveredMarket>,
}

pub type DiscoveryTx = watch::Sender<DiscoveryResult>;
pub type DiscoveryRx = watch::Receiver<DiscoveryResult>;

pub fn channel() -> (DiscoveryTx, DiscoveryRx) {
    watch::channel(DiscoveryResult::default())
}

pub struct DiscoverySources {
    pub predict_base_url: String,
    pub probable_base_url: String,
    pub opinion_base_url: String,
}

/// Fetch all three catalogs, match them pairwise, and build the
/// fingerprint-keyed maps. A venue that fails to fetch contributes an
/// empty catalog rather than aborting discovery for the other two.
pub async fn discover(client: &reqwest::Client, sources: &DiscoverySources, config: &Config) -> DiscoveryResult {
    let (predict_markets, probable_markets, opinion_markets) = tokio::join!(
        predict::fetch_catalog(client, &sources.predict_base_url),
        probable::fetch_catalog(client, &sources.probable_base_url),
        opinion::fetch_catalog(client, &sources.opinion_base_url),
    );

    info!(
        predict = predict_markets.len(),
        probable = probable_markets.len(),
        opinion = opinion_markets.len(),
        "catalogs fetched"
    );

    let current_year = chrono::Utc::now().format("%Y").to_string().parse().unwrap_or(2026);

    let predict_inputs: Vec<MarketInput> = predict_markets.iter().map(MarketInput::from).collect();
    let probable_inputs: Vec<MarketInput> = probable_markets.iter().map(MarketInput::from).collect();
    let opinion_inputs: Vec<MarketInput> = opinion_markets.iter().map(MarketInput::from).collect();

    let probable_predict = match_markets(&probable_inputs, &predict_inputs, current_year, config);
    let opinion_predict = match_markets(&opinion_inputs, &predict_inputs, current_year, config);
    let opinion_probable = match_markets(&opinion_inputs, &probable_inputs, current_year, config);

    let predict_by_id = index_by_id(&predict_markets);
    let probable_by_id = index_by_id(&probable_markets);
    let opinion_by_id = index_by_id(&opinion_markets);

    let mut result = DiscoveryResult::default();
    let mut assigned: HashMap<(Platform, String), Fingerprint> = HashMap::new();

    // Predict anchors every fingerprint it participates in; this pass
    // runs first so later passes never overwrite a Predict-anchored entry.
    // `other_platform` is known statically per match list, never inferred
    // from id equality (ids are unique within a platform only, so a lookup
    // keyed on id alone across platforms would risk cross-contamination).
    absorb_predict_side(
        &probable_predict,
        Platform::Probable,
        &predict_by_id,
        &probable_by_id,
        &mut result.predict,
        &mut result.probable,
        &mut assigned,
    );
    absorb_predict_side(
        &opinion_predict,
        Platform::Opinion,
        &predict_by_id,
        &opinion_by_id,
        &mut result.predict,
        &mut result.opinion,
        &mut assigned,
    );

    // Opinion<->Probable matches fill in remaining unmatched pairs, but
    // must never overwrite a Predict-anchored fingerprint on either side.
    for m in &opinion_probable {
        let opinion_id = (Platform::Opinion, m.market_a.id.clone());
        let probable_id = (Platform::Probable, m.market_b.id.clone());
        if assigned.contains_key(&opinion_id) || assigned.contains_key(&probable_id) {
            continue;
        }
        let fingerprint = resolve_fingerprint(
            None,
            m.market_b.condition_id.as_deref(),
            Some(m.market_a.id.as_str()),
            &m.market_a.id,
        );
        assign(
            &mut result.opinion,
            &opinion_by_id,
            &mut assigned,
            Platform::Opinion,
            &m.market_a.id,
            fingerprint.clone(),
        );
        assign(
            &mut result.probable,
            &probable_by_id,
            &mut assigned,
            Platform::Probable,
            &m.market_b.id,
            fingerprint,
        );
    }

    // Anything left unmatched still gets its own fingerprint so it can
    // be scanned (and simply never pair up with another venue).
    fill_unmatched(&mut result.predict, &predict_by_id, &mut assigned, Platform::Predict);
    fill_unmatched(&mut result.probable, &probable_by_id, &mut assigned, Platform::Probable);
    fill_unmatched(&mut result.opinion, &opinion_by_id, &mut assigned, Platform::Opinion);

    result
}

fn index_by_id(markets: &[DiscoveredMarket]) -> HashMap<String, DiscoveredMarket> {
    markets.iter().map(|m| (m.id.clone(), m.clone())).collect()
}

/// §3/§4.6 fingerprint precedence: Predict `conditionId`, then Probable
/// `conditionId`, then the Opinion numeric id cast to hex, falling back to
/// a venue's raw platform id only when none of those identify the market.
fn resolve_fingerprint(
    predict_condition_id: Option<&str>,
    probable_condition_id: Option<&str>,
    opinion_id: Option<&str>,
    fallback_id: &str,
) -> Fingerprint {
    if let Some(cid) = predict_condition_id {
        return Fingerprint::new(cid);
    }
    if let Some(cid) = probable_condition_id {
        return Fingerprint::new(cid);
    }
    if let Some(id) = opinion_id {
        if let Ok(n) = id.parse::<i64>() {
            return Fingerprint::from_opinion_id(n);
        }
    }
    Fingerprint::new(fallback_id)
}

fn assign(
    map: &mut HashMap<Fingerprint, DiscoveredMarket>,
    by_id: &HashMap<String, DiscoveredMarket>,
    assigned: &mut HashMap<(Platform, String), Fingerprint>,
    platform: Platform,
    id: &str,
    fingerprint: Fingerprint,
) {
    let key = (platform, id.to_string());
    if assigned.contains_key(&key) {
        return;
    }
    if let Some(market) = by_id.get(id) {
        map.insert(fingerprint.clone(), market.clone());
        assigned.insert(key, fingerprint);
    }
}

#[allow(clippy::too_many_arguments)]
fn absorb_predict_side(
    matches: &[crate::types::MatchResult],
    other_platform: Platform,
    predict_by_id: &HashMap<String, DiscoveredMarket>,
    other_by_id: &HashMap<String, DiscoveredMarket>,
    predict_map: &mut HashMap<Fingerprint, DiscoveredMarket>,
    other_map: &mut HashMap<Fingerprint, DiscoveredMarket>,
    assigned: &mut HashMap<(Platform, String), Fingerprint>,
) {
    for m in matches {
        let predict_market = &m.market_b;
        let other_market = &m.market_a;
        let (probable_cid, opinion_id) = match other_platform {
            Platform::Probable => (other_market.condition_id.as_deref(), None),
            Platform::Opinion => (None, Some(other_market.id.as_str())),
            Platform::Predict => (None, None),
        };
        let fingerprint = resolve_fingerprint(
            predict_market.condition_id.as_deref(),
            probable_cid,
            opinion_id,
            &predict_market.id,
        );
        assign(
            predict_map,
            predict_by_id,
            assigned,
            Platform::Predict,
            &predict_market.id,
            fingerprint.clone(),
        );
        assign(
            other_map,
            other_by_id,
            assigned,
            other_platform,
            &other_market.id,
            fingerprint,
        );
    }
}

fn fill_unmatched(
    map: &mut HashMap<Fingerprint, DiscoveredMarket>,
    by_id: &HashMap<String, DiscoveredMarket>,
    assigned: &mut HashMap<(Platform, String), Fingerprint>,
    platform: Platform,
) {
    for (id, market) in by_id {
        let key = (platform, id.clone());
        if assigned.contains_key(&key) {
            continue;
        }
        let fingerprint = if platform == Platform::Opinion {
            resolve_fingerprint(None, None, Some(id.as_str()), id)
        } else {
            resolve_fingerprint(market.condition_id.as_deref(), None, None, id)
        };
        map.insert(fingerprint.clone(), market.clone());
        assigned.insert(key, fingerprint);
    }
}
