//! Probable-family catalog fetch: offset-based pagination until a page
//! shorter than 100 is returned.

use serde::Deserialize;
use tracing::warn;

use crate::types::{DiscoveredMarket, Platform};

const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize, Default)]
struct RawEvent {
    #[serde(default)]
    markets: Vec<RawMarket>,
}

#[derive(Debug, Deserialize, Default)]
struct RawMarket {
    id: String,
    title: String,
    #[serde(default)]
    condition_id: Option<String>,
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

pub async fn fetch_catalog(client: &reqwest::Client, base_url: &str) -> Vec<DiscoveredMarket> {
    let mut all = Vec::new();
    let mut offset: u32 = 0;

    loop {
        let resp = client
            .get(format!("{base_url}/public/api/v1/events"))
            .query(&[
                ("active", "true".to_string()),
                ("limit", PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ])
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await;

        let events: Vec<RawEvent> = match resp {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "failed to parse probable events page");
                    break;
                }
            },
            Ok(r) => {
                warn!(status = %r.status(), "probable events fetch returned non-2xx");
                break;
            }
            Err(e) => {
                warn!(error = %e, "probable catalog fetch failed; treating venue as empty");
                break;
            }
        };

        let page_market_count: usize = events.iter().map(|e| e.markets.len()).sum();
        for event in events {
            for m in event.markets {
                if let Some(market) = to_discovered(m) {
                    all.push(market);
                }
            }
        }

        if page_market_count < PAGE_SIZE as usize {
            break;
        }
        offset += PAGE_SIZE;
    }

    dedupe_by_id(all)
}

fn to_discovered(raw: RawMarket) -> Option<DiscoveredMarket> {
    let yes = raw.outcomes.iter().find(|o| o.label.eq_ignore_ascii_case("yes"))?;
    let no = raw.outcomes.iter().find(|o| o.label.eq_ignore_ascii_case("no"))?;
    if raw.outcomes.len() != 2 || yes.token_id.is_empty() || no.token_id.is_empty() {
        return None;
    }
    Some(DiscoveredMarket {
        id: raw.id,
        platform: Platform::Probable,
        title: raw.title,
        condition_id: raw.condition_id,
        category: raw.category,
        resolves_at: raw.resolves_at,
        yes_token_id: yes.token_id.clone(),
        no_token_id: no.token_id.clone(),
        outcome_labels: [yes.label.clone(), no.label.clone()],
        image: raw.image,
        url: raw.url,
    })
}

fn dedupe_by_id(markets: Vec<DiscoveredMarket>) -> Vec<DiscoveredMarket> {
    let mut seen = std::collections::HashSet::new();
    markets
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}
