//! PredictProvider — `asks` are YES sellers sorted ascending by price,
//! `bids` are YES buyers sorted descending. `yesPrice` = best ask,
//! `noPrice = 1 - bestBid` (complement — see open question in §9 re: a
//! dedicated NO book, exposed here as `use_dedicated_no_book`).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tokio::sync::{Mutex, Semaphore};
use tracing::warn;

use crate::error::AgentError;
use crate::quotes::SLIPPAGE_WINDOW_BPS;
use crate::retry::{with_retry, RetryConfig};
use crate::types::{Fingerprint, MarketQuote, Platform};

pub const FEE_BPS: u32 = 200;

#[derive(Debug, Deserialize)]
struct OrderbookLevel {
    price: Decimal,
    size: Decimal,
}

#[derive(Debug, Deserialize, Default)]
struct OrderbookResponse {
    #[serde(default)]
    asks: Vec<OrderbookLevel>,
    #[serde(default)]
    bids: Vec<OrderbookLevel>,
}

pub struct PredictQuoteProvider {
    client: reqwest::Client,
    base_url: String,
    /// `(fingerprint, yes_token_id)` pairs this provider tracks.
    markets: Vec<(Fingerprint, String)>,
    concurrency: usize,
    /// Markets that 404'd once — stop polling them (per-provider dead-set).
    dead_set: Arc<Mutex<HashSet<String>>>,
    /// Open question flagged in §9: whether to treat NO as the complement
    /// of the YES book (default, matches the spec) or fetch a dedicated NO
    /// book. Off by default; an explicit config toggle only.
    pub use_dedicated_no_book: bool,
}

impl PredictQuoteProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        markets: Vec<(Fingerprint, String)>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            markets,
            concurrency: 10,
            dead_set: Arc::new(Mutex::new(HashSet::new())),
            use_dedicated_no_book: false,
        }
    }

    async fn fetch_one(&self, token_id: &str) -> Result<Option<(Decimal, Decimal, Decimal, Decimal)>, AgentError> {
        let url = format!("{}/v1/markets/{}/orderbook", self.base_url, token_id);
        let retry_cfg = RetryConfig::default();
        let client = self.client.clone();
        let url_owned = url.clone();

        let result = with_retry(&retry_cfg, "predict.fetch_orderbook", || {
            let client = client.clone();
            let url = url_owned.clone();
            async move {
                let resp = client
                    .get(&url)
                    .timeout(std::time::Duration::from_secs(5))
                    .send()
                    .await
                    .map_err(|e| AgentError::from_network_error(&e))?;
                let status = resp.status();
                if status.as_u16() == 404 {
                    return Err(AgentError::validation("market not found (404)"));
                }
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AgentError::from_status(status.as_u16(), &body));
                }
                resp.json::<OrderbookResponse>()
                    .await
                    .map_err(|e| AgentError::from_network_error(&e))
            }
        })
        .await;

        let book = match result {
            Ok(book) => book,
            Err(AgentError::Validation { .. }) => {
                self.dead_set.lock().await.insert(token_id.to_string());
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(best_ask) = book.asks.iter().min_by_key(|l| l.price) else {
            return Ok(None);
        };
        let Some(best_bid) = book.bids.iter().max_by_key(|l| l.price) else {
            return Ok(None);
        };

        let yes_price = best_ask.price;
        let no_price = Decimal::ONE - best_bid.price;

        let yes_depth = depth_within_slippage(&book.asks, best_ask.price, true);
        let no_depth = depth_within_slippage(&book.bids, best_bid.price, false);

        Ok(Some((yes_price, no_price, yes_depth, no_depth)))
    }

    pub async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>, AgentError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let dead_set = self.dead_set.lock().await.clone();

        let futures = self
            .markets
            .iter()
            .filter(|(_, token_id)| !dead_set.contains(token_id))
            .map(|(fingerprint, token_id)| {
                let semaphore = semaphore.clone();
                let fingerprint = fingerprint.clone();
                let token_id = token_id.clone();
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore never closed");
                    let quoted_at = Utc::now();
                    match self.fetch_one(&token_id).await {
                        Ok(Some((yes_price, no_price, yes_liquidity, no_liquidity))) => {
                            if yes_price <= Decimal::ZERO
                                || no_price <= Decimal::ZERO
                                || yes_price >= Decimal::ONE
                                || no_price >= Decimal::ONE
                                || yes_liquidity.min(no_liquidity) < dec!(1)
                            {
                                return None;
                            }
                            Some(MarketQuote {
                                market_id: fingerprint,
                                protocol: Platform::Predict,
                                yes_price,
                                no_price,
                                yes_liquidity,
                                no_liquidity,
                                fee_bps: FEE_BPS,
                                quoted_at,
                                title: None,
                                outcome_labels: None,
                            })
                        }
                        Ok(None) => None,
                        Err(e) => {
                            warn!(token_id, error = %e, "predict quote fetch failed");
                            None
                        }
                    }
                }
            });

        let results = futures::future::join_all(futures).await;
        Ok(results.into_iter().flatten().collect())
    }
}

fn depth_within_slippage(levels: &[OrderbookLevel], touch: Decimal, ascending: bool) -> Decimal {
    let window = Decimal::from(SLIPPAGE_WINDOW_BPS) / dec!(10_000);
    levels
        .iter()
        .filter(|l| {
            if ascending {
                l.price - touch <= touch * window
            } else {
                touch - l.price <= touch * window
            }
        })
        .map(|l| l.size)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_sums_only_levels_within_window() {
        let levels = vec![
            OrderbookLevel { price: dec!(0.50), size: dec!(100) },
            OrderbookLevel { price: dec!(0.51), size: dec!(200) },
            OrderbookLevel { price: dec!(0.60), size: dec!(500) },
        ];
        let depth = depth_within_slippage(&levels, dec!(0.50), true);
        assert_eq!(depth, dec!(300));
    }
}
