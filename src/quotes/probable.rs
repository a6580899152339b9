//! ProbableProvider — fetches two separate order books (YES token and NO
//! token). Each side's price is the best ask of its own book (ask-only
//! pricing — no complement).

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

pub const FEE_BPS: u32 = 175;

#[derive(Debug, Deserialize)]
struct BookLevel {
    price: Decimal,
    size: Decimal,
}

#[derive(Debug, Deserialize, Default)]
struct BookResponse {
    #[serde(default)]
    asks: Vec<BookLevel>,
}

pub struct ProbableQuoteProvider {
    client: reqwest::Client,
    base_url: String,
    markets: Vec<(Fingerprint, String, String)>, // (fingerprint, yes_token_id, no_token_id)
    concurrency: usize,
}

impl ProbableQuoteProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        markets: Vec<(Fingerprint, String, String)>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            markets,
            concurrency: 10,
        }
    }

    async fn fetch_book(&self, token_id: &str) -> Result<Option<(Decimal, Decimal)>, AgentError> {
        let url = format!("{}/public/api/v1/book", self.base_url);
        let retry_cfg = RetryConfig::default();
        let client = self.client.clone();
        let token_id_owned = token_id.to_string();

        let book = with_retry(&retry_cfg, "probable.fetch_book", || {
            let client = client.clone();
            let token_id = token_id_owned.clone();
            let url = url.clone();
            async move {
                let resp = client
                    .get(&url)
                    .query(&[("token_id", token_id.as_str())])
                    .timeout(std::time::Duration::from_secs(5))
                    .send()
                    .await
                    .map_err(|e| AgentError::from_network_error(&e))?;
                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AgentError::from_status(status.as_u16(), &body));
                }
                resp.json::<BookResponse>()
                    .await
                    .map_err(|e| AgentError::from_network_error(&e))
            }
        })
        .await?;

        let Some(best_ask) = book.asks.iter().min_by_key(|l| l.price) else {
            return Ok(None);
        };
        let window = Decimal::from(SLIPPAGE_WINDOW_BPS) / dec!(10_000);
        let depth: Decimal = book
            .asks
            .iter()
            .filter(|l| l.price - best_ask.price <= best_ask.price * window)
            .map(|l| l.size)
            .sum();

        Ok(Some((best_ask.price, depth)))
    }

    pub async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>, AgentError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let futures = self
            .markets
            .iter()
            .map(|(fingerprint, yes_token, no_token)| {
                let semaphore = semaphore.clone();
                let fingerprint = fingerprint.clone();
                let yes_token = yes_token.clone();
                let no_token = no_token.clone();
                async move {
                    let _permit = semaphore.acquire().await.expect("semaphore never closed");
                    let quoted_at = Utc::now();

                    let yes_result = self.fetch_book(&yes_token).await;
                    let no_result = self.fetch_book(&no_token).await;

                    match (yes_result, no_result) {
                        (Ok(Some((yes_price, yes_liquidity))), Ok(Some((no_price, no_liquidity)))) => {
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
                                protocol: Platform::Probable,
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
                        (Err(e), _) | (_, Err(e)) => {
                            warn!(error = %e, "probable quote fetch failed");
                            None
                        }
                        _ => None,
                    }
                }
            });

        let results = futures::future::join_all(futures).await;
        Ok(results.into_iter().flatten().collect())
    }
}
