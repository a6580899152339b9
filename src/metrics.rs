//! Counters-only metrics (no exporter — an exporter is a dashboard
//! concern). The agent loop logs a snapshot each tick via `tracing`
//! instead of pushing to an external alerting channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub quotes_fetched: u64,
    pub quote_fetch_errors: u64,
    pub opportunities_found: u64,
    pub opportunities_skipped_stale: u64,
    pub trades_executed: u64,
    pub trades_partial: u64,
    pub trades_failed: u64,
    pub daily_loss_usdt: u64,
}

#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    quotes_fetched: AtomicU64,
    quote_fetch_errors: AtomicU64,
    opportunities_found: AtomicU64,
    opportunities_skipped_stale: AtomicU64,
    trades_executed: AtomicU64,
    trades_partial: AtomicU64,
    trades_failed: AtomicU64,
    daily_loss_usdt: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub fn inc_quotes_fetched(&self, n: u64) {
        self.inner.quotes_fetched.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_quote_fetch_errors(&self) {
        self.inner.quote_fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_opportunities_found(&self, n: u64) {
        self.inner
            .opportunities_found
            .fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_opportunities_skipped_stale(&self) {
        self.inner
            .opportunities_skipped_stale
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_executed(&self) {
        self.inner.trades_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_partial(&self) {
        self.inner.trades_partial.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trades_failed(&self) {
        self.inner.trades_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_daily_loss(&self, amount: u64) {
        self.inner.daily_loss_usdt.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn reset_daily_loss(&self) {
        self.inner.daily_loss_usdt.store(0, Ordering::Relaxed);
    }

    pub fn daily_loss(&self) -> u64 {
        self.inner.daily_loss_usdt.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            quotes_fetched: self.inner.quotes_fetched.load(Ordering::Relaxed),
            quote_fetch_errors: self.inner.quote_fetch_errors.load(Ordering::Relaxed),
            opportunities_found: self.inner.opportunities_found.load(Ordering::Relaxed),
            opportunities_skipped_stale: self
                .inner
                .opportunities_skipped_stale
                .load(Ordering::Relaxed),
            trades_executed: self.inner.trades_executed.load(Ordering::Relaxed),
            trades_partial: self.inner.trades_partial.load(Ordering::Relaxed),
            trades_failed: self.inner.trades_failed.load(Ordering::Relaxed),
            daily_loss_usdt: self.inner.daily_loss_usdt.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = Metrics::new();
        m.inc_quotes_fetched(5);
        m.inc_trades_executed();
        m.add_daily_loss(1_000_000);
        let snap = m.snapshot();
        assert_eq!(snap.quotes_fetched, 5);
        assert_eq!(snap.trades_executed, 1);
        assert_eq!(snap.daily_loss_usdt, 1_000_000);
    }

    #[test]
    fn daily_loss_resets() {
        let m = Metrics::new();
        m.add_daily_loss(500);
        m.reset_daily_loss();
        assert_eq!(m.daily_loss(), 0);
    }
}
