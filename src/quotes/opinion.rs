//! OpinionProvider — same shape as PredictProvider (complement pricing),
//! different endpoint.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tokio::sync::Semaphore;
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

pub struct OpinionQuoteProvider {
    client: reqwest::Client,
    base_url: String,
    markets: Vec<(Fingerprint, String)>,
    concurrency: usize,
}

impl OpinionQuoteProvider {
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
        }
    }

    async fn fetch_one(&self, market_id: &str) -> Result<Option<(Decimal, Decimal, Decimal, Decimal)>, AgentError> {
        let url = format!("{}/orderbook/{}", self.base_url, market_id);
        let retry_cfg = RetryConfig::default();
        let client = self.client.clone();
        let url_owned = url.clone();

        let book = with_retry(&retry_cfg, "opinion.fetch_orderbook", || {
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

        let book = match book {
            Ok(b) => b,
            Err(AgentError::Validation { .. }) => return Ok(None),
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

        let window = Decimal::from(SLIPPAGE_WINDOW_BPS) / dec!(10_000);
        let yes_depth: Decimal = book
            .asks
            .iter()
            .filter(|l| l.price - best_ask.price <= best_ask.price * window)
            .map(|l| l.size)
            .sum();
        let no_depth: Decimal = book
            .bids
            .iter()
            .filter(|l| best_bid.price - l.price <= best_bid.price * window)
            .map(|l| l.size)
            .sum();

        Ok(Some((yes_price, no_price, yes_depth, no_depth)))
    }

    pub async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>, AgentError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let futures = self.markets.iter().map(|(fingerprint, market_id)| {
            let semaphore = semaphore.clone();
            let fingerprint = fingerprint.clone();
            let market_id = market_id.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                let quoted_at = Utc::now();
                match self.fetch_one(&market_id).await {
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
                            protocol: Platform::Opinion,
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
                        warn!(market_id, error = %e, "opinion quote fetch failed");
                        None
                    }
                }
            }
        });

        let results = futures::future::join_all(futures).await;
        Ok(results.into_iter().flatten().collect())
    }
}
