//! Predict-family catalog fetch: cursor-based pagination until the response
//! is shorter than the page size.

use serde::Deserialize;
use tracing::warn;

use crate::types::{DiscoveredMarket, Platform};

const PAGE_SIZE: u32 = 50;

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

#[derive(Debug, Deserialize, Default)]
struct MarketsPage {
    #[serde(default)]
    markets: Vec<RawMarket>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Fetch the whole Predict catalog, paging by cursor until a page shorter
/// than `PAGE_SIZE` is returned. Tolerates the whole venue being down by
/// returning an empty vec rather than propagating.
pub async fn fetch_catalog(client: &reqwest::Client, base_url: &str) -> Vec<DiscoveredMarket> {
    let mut all = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut req = client
            .get(format!("{base_url}/v1/markets"))
            .query(&[("status", "OPEN"), ("first", &PAGE_SIZE.to_string())]);
        if let Some(ref c) = cursor {
            req = req.query(&[("cursor", c.as_str())]);
        }

        let page: MarketsPage = match req
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => match resp.json().await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, "failed to parse predict markets page");
                    break;
                }
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "predict markets fetch returned non-2xx");
                break;
            }
            Err(e) => {
                warn!(error = %e, "predict catalog fetch failed; treating venue as empty");
                break;
            }
        };

        let count = page.markets.len();
        for m in page.markets {
            if let Some(market) = to_discovered(m) {
                all.push(market);
            }
        }

        match page.next_cursor {
            Some(c) if count as u32 >= PAGE_SIZE => cursor = Some(c),
            _ => break,
        }
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
        platform: Platform::Predict,
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

