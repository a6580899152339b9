//! Opinion catalog fetch: page-number-based pagination using a `total`
//! hint, `GET /market?page=N&pageSize=M` returning `{errno,
//! result:{total, list:[...]}}`.

use serde::Deserialize;
use tracing::warn;

use crate::types::{DiscoveredMarket, Platform};

const PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize, Default)]
struct RawMarket {
    #[serde(rename = "marketId")]
    market_id: i64,
    title: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    resolves_at: Option<i64>,
    #[serde(default)]
    outcomes: Vec<RawOutcome>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawOutcome {
    label: String,
    token_id: String,
}

#[derive(Debug, Deserialize)]
struct OpinionResult {
    total: u32,
    #[serde(default)]
    list: Vec<RawMarket>,
}

#[derive(Debug, Deserialize)]
struct OpinionResponse {
    #[allow(dead_code)]
    errno: i32,
    result: OpinionResult,
}

pub async fn fetch_catalog(client: &reqwest::Client, base_url: &str) -> Vec<DiscoveredMarket> {
    let mut all = Vec::new();
    let mut page: u32 = 1;
    let mut total_seen = 0u32;

    loop {
        let resp = client
            .get(format!("{base_url}/market"))
            .query(&[("page", page), ("pageSize", PAGE_SIZE)])
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await;

        let body: OpinionResponse = match resp {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "failed to parse opinion markets page");
                    break;
                }
            },
            Ok(r) => {
                warn!(status = %r.status(), "opinion markets fetch returned non-2xx");
                break;
            }
            Err(e) => {
                warn!(error = %e, "opinion catalog fetch failed; treating venue as empty");
                break;
            }
        };

        let got = body.result.list.len() as u32;
        for m in body.result.list {
            if let Some(market) = to_discovered(m) {
                all.push(market);
            }
        }
        total_seen += got;

        if got == 0 || total_seen >= body.result.total {
            break;
        }
        page += 1;
    }

    dedupe_by_market_id(all)
}

fn to_discovered(raw: RawMarket) -> Option<DiscoveredMarket> {
    let yes = raw.outcomes.iter().find(|o| o.label.eq_ignore_ascii_case("yes"))?;
    let no = raw.outcomes.iter().find(|o| o.label.eq_ignore_ascii_case("no"))?;
    if raw.outcomes.len() != 2 || yes.token_id.is_empty() || no.token_id.is_empty() {
        return None;
    }
    Some(DiscoveredMarket {
        id: raw.market_id.to_string(),
        platform: Platform::Opinion,
        title: raw.title,
        condition_id: None,
        category: raw.category,
        resolves_at: raw.resolves_at,
        yes_token_id: yes.token_id.clone(),
        no_token_id: no.token_id.clone(),
        outcome_labels: [yes.label.clone(), no.label.clone()],
        image: raw.image,
        url: raw.url,
    })
}

fn dedupe_by_market_id(markets: Vec<DiscoveredMarket>) -> Vec<DiscoveredMarket> {
    let mut seen = std::collections::HashSet::new();
    markets
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}
