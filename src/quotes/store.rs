//! C7 — Quote Store: in-memory mapping `fingerprint -> { protocol -> latest
//! MarketQuote }`, with freshness tracked at read time. Writes are batched
//! per provider; writers never overwrite a fresher quote from another
//! provider (last-writer-wins by `quotedAt`, scoped per fingerprint/protocol
//! pair so concurrent providers never race each other's rows).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::types::{Fingerprint, MarketQuote, Platform};

#[derive(Debug, Clone, Default)]
pub struct QuoteStore {
    inner: Arc<RwLock<HashMap<Fingerprint, HashMap<Platform, MarketQuote>>>>,
}

impl QuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch-write one provider's freshly fetched quotes. Each quote only
    /// overwrites the existing row for its own (fingerprint, protocol) pair
    /// if it is not older than what's already there.
    pub async fn write_batch(&self, quotes: Vec<MarketQuote>) {
        let mut guard = self.inner.write().await;
        for quote in quotes {
            let by_protocol = guard.entry(quote.market_id.clone()).or_default();
            let should_write = match by_protocol.get(&quote.protocol) {
                Some(existing) => quote.quoted_at >= existing.quoted_at,
                None => true,
            };
            if should_write {
                by_protocol.insert(quote.protocol, quote);
            }
        }
    }

    /// Fresh quotes (`now - quotedAt <= freshness_max`) for a fingerprint,
    /// across all venues that have one. Stale rows are filtered here, not
    /// deleted from the store.
    pub async fn fresh_quotes(
        &self,
        fingerprint: &Fingerprint,
        freshness_max_secs: i64,
    ) -> Vec<MarketQuote> {
        let guard = self.inner.read().await;
        let Some(by_protocol) = guard.get(fingerprint) else {
            return Vec::new();
        };
        let now = Utc::now();
        by_protocol
            .values()
            .filter(|q| (now - q.quoted_at).num_seconds() <= freshness_max_secs)
            .cloned()
            .collect()
    }

    /// Snapshot of all fingerprints currently tracked, for the scanner to
    /// iterate over.
    pub async fn fingerprints(&self) -> Vec<Fingerprint> {
        let guard = self.inner.read().await;
        guard.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn quote(fp: &str, protocol: Platform, age_secs: i64) -> MarketQuote {
        MarketQuote {
            market_id: Fingerprint::new(fp),
            protocol,
            yes_price: dec!(0.5),
            no_price: dec!(0.5),
            yes_liquidity: dec!(1000),
            no_liquidity: dec!(1000),
            fee_bps: 200,
            quoted_at: Utc::now() - Duration::seconds(age_secs),
            title: None,
            outcome_labels: None,
        }
    }

    #[tokio::test]
    async fn stale_quotes_filtered_at_read_time_not_deleted() {
        let store = QuoteStore::new();
        store
            .write_batch(vec![quote("fp1", Platform::Predict, 100)])
            .await;
        let fresh = store.fresh_quotes(&Fingerprint::new("fp1"), 30).await;
        assert!(fresh.is_empty());

        // still present internally — a later fresh write coexists.
        store
            .write_batch(vec![quote("fp1", Platform::Probable, 1)])
            .await;
        let fresh = store.fresh_quotes(&Fingerprint::new("fp1"), 30).await;
        assert_eq!(fresh.len(), 1);
    }

    #[tokio::test]
    async fn newer_quote_does_not_get_overwritten_by_older_write() {
        let store = QuoteStore::new();
        let newer = quote("fp1", Platform::Predict, 1);
        let older = quote("fp1", Platform::Predict, 50);
        store.write_batch(vec![newer.clone()]).await;
        store.write_batch(vec![older]).await;
        let fresh = store.fresh_quotes(&Fingerprint::new("fp1"), 30).await;
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].quoted_at, newer.quoted_at);
    }
}
