//! C11 — the agent loop. Ticks on `scanIntervalMs`: refresh quotes, scan
//! for opportunities, execute the best one that clears the configured
//! threshold, persist a state snapshot. Per §7, the loop itself never
//! propagates an error — every failure reduces to a metric increment and
//! the state is left unchanged for that tick.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::clients::VenueClient;
use crate::config::Config;
use crate::discovery::{DiscoveryResult, DiscoveryRx};
use crate::executor::{ExecutionOutcome, Executor};
use crate::metrics::Metrics;
use crate::quotes::store::QuoteStore;
use crate::quotes::{OpinionQuoteProvider, PredictQuoteProvider, ProbableQuoteProvider};
use crate::scanner;
use crate::state::PersistedState;
use crate::types::{ArbitOpportunity, Platform};

/// Everything one tick needs: the quote providers (rebuilt whenever
/// discovery republishes its catalog), the shared quote store, the
/// executor, and where to persist state.
pub struct Agent {
    config: Config,
    metrics: Metrics,
    store: QuoteStore,
    executor: Executor,
    state_path: PathBuf,
    state: tokio::sync::Mutex<PersistedState>,
}

impl Agent {
    pub fn new(config: Config, metrics: Metrics, executor: Executor, state_path: PathBuf, state: PersistedState) -> Self {
        Self {
            config,
            metrics,
            store: QuoteStore::new(),
            executor,
            state_path,
            state: tokio::sync::Mutex::new(state),
        }
    }

    pub fn store(&self) -> &QuoteStore {
        &self.store
    }

    /// Run forever, ticking every `scanIntervalMs`. Returns only if the
    /// caller cancels the surrounding task — there is no internal exit
    /// condition.
    pub async fn run(&self, discovery: DiscoveryRx) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.scan_interval_ms));
        loop {
            ticker.tick().await;
            self.tick(&discovery).await;
        }
    }

    /// One scan/execute/persist cycle. Every internal failure is caught
    /// and logged; the loop always returns normally.
    pub async fn tick(&self, discovery: &DiscoveryRx) {
        let snapshot = discovery.borrow().clone();

        self.refresh_quotes(&snapshot).await;

        let opportunities = scanner::scan(&self.store, &self.config).await;
        self.metrics.inc_opportunities_found(opportunities.len() as u64);

        if !self.session_trade_limit_reached().await {
            if let Some(best) = opportunities.into_iter().find(|o| o.spread_bps >= self.config.min_spread_bps) {
                self.try_execute(&snapshot, best).await;
            }
        }

        let mut state = self.state.lock().await;
        state.last_scan = Utc::now().timestamp_millis();
        if let Err(e) = state.save(&self.state_path).await {
            warn!(error = %e, "failed to persist agent state, continuing with in-memory state only");
        }
    }

    /// §4.12 item 3: the session-wide trade cap, distinct from the executor's
    /// per-day loss breaker. `None` means unbounded.
    async fn session_trade_limit_reached(&self) -> bool {
        let Some(limit) = self.config.max_trades_per_session else {
            return false;
        };
        let state = self.state.lock().await;
        state.trades_executed >= limit
    }

    async fn refresh_quotes(&self, snapshot: &DiscoveryResult) {
        let predict_markets: Vec<_> = snapshot
            .predict
            .iter()
            .map(|(fp, m)| (fp.clone(), m.yes_token_id.clone()))
            .collect();
        let probable_markets: Vec<_> = snapshot
            .probable
            .iter()
            .map(|(fp, m)| (fp.clone(), m.yes_token_id.clone(), m.no_token_id.clone()))
            .collect();
        let opinion_markets: Vec<_> = snapshot
            .opinion
            .iter()
            .map(|(fp, m)| (fp.clone(), m.yes_token_id.clone()))
            .collect();

        let client = reqwest::Client::new();
        let predict = PredictQuoteProvider::new(client.clone(), predict_base_url(), predict_markets);
        let probable = ProbableQuoteProvider::new(client.clone(), probable_base_url(), probable_markets);
        let opinion = OpinionQuoteProvider::new(client, opinion_base_url(), opinion_markets);

        let (r1, r2, r3) = tokio::join!(predict.fetch_quotes(), probable.fetch_quotes(), opinion.fetch_quotes());

        for result in [r1, r2, r3] {
            match result {
                Ok(quotes) => {
                    self.metrics.inc_quotes_fetched(quotes.len() as u64);
                    self.store.write_batch(quotes).await;
                }
                Err(e) => {
                    warn!(error = %e, "quote provider fetch failed for this tick");
                    self.metrics.inc_quote_fetch_errors();
                }
            }
        }
    }

    async fn try_execute(&self, snapshot: &DiscoveryResult, opportunity: ArbitOpportunity) {
        let Some((token_a, token_b)) = tokens_for(snapshot, &opportunity) else {
            warn!(market_id = %opportunity.market_id, "opportunity references a market missing from the discovery snapshot, skipping");
            self.metrics.inc_opportunities_skipped_stale();
            return;
        };

        let (leg_a, leg_b) = Executor::legs_for(&opportunity, token_a, token_b);
        match self.executor.execute(&opportunity, leg_a, leg_b).await {
            ExecutionOutcome::Filled(position) => {
                info!(position_id = %position.position_id, "opportunity executed successfully");
                let mut state = self.state.lock().await;
                state.trades_executed += 1;
                state.positions.push(position);
            }
            ExecutionOutcome::PartialFailure(position) => {
                warn!(position_id = %position.position_id, "opportunity executed with a partial failure");
                let mut state = self.state.lock().await;
                state.positions.push(position);
            }
            ExecutionOutcome::Aborted { reason } => {
                warn!(reason, "opportunity execution aborted before any leg filled");
            }
            ExecutionOutcome::Rejected { reason } => {
                warn!(reason, "opportunity rejected before execution");
            }
        }
    }
}

fn tokens_for(snapshot: &DiscoveryResult, opportunity: &ArbitOpportunity) -> Option<(String, String)> {
    let market_a = market_for(snapshot, opportunity.protocol_a, &opportunity.market_id)?;
    let market_b = market_for(snapshot, opportunity.protocol_b, &opportunity.market_id)?;
    let token_a = if opportunity.buy_yes_on_a { &market_a.yes_token_id } else { &market_a.no_token_id };
    let token_b = if opportunity.buy_yes_on_a { &market_b.no_token_id } else { &market_b.yes_token_id };
    Some((token_a.clone(), token_b.clone()))
}

fn market_for<'a>(
    snapshot: &'a DiscoveryResult,
    platform: Platform,
    fingerprint: &crate::types::Fingerprint,
) -> Option<&'a crate::types::DiscoveredMarket> {
    match platform {
        Platform::Predict => snapshot.predict.get(fingerprint),
        Platform::Probable => snapshot.probable.get(fingerprint),
        Platform::Opinion => snapshot.opinion.get(fingerprint),
    }
}

/// Build the `Platform -> VenueClient` map the executor dispatches on, one
/// client per configured venue.
pub fn build_clients(
    http: reqwest::Client,
    config: &Config,
    predict_base_url: impl Into<String>,
    probable_base_url: impl Into<String>,
    opinion_base_url: impl Into<String>,
    probable_api_key: impl Into<String>,
    probable_api_secret: impl Into<String>,
    opinion_api_key: impl Into<String>,
    signer: alloy::signers::local::PrivateKeySigner,
) -> HashMap<Platform, VenueClient> {
    let predict_exchange_address = config
        .predict_exchange_address
        .parse::<alloy::primitives::Address>()
        .unwrap_or(alloy::primitives::Address::ZERO);

    let mut clients = HashMap::new();
    clients.insert(
        Platform::Predict,
        VenueClient::Predict(crate::clients::predict::PredictClient::new(
            http.clone(),
            predict_base_url,
            signer.clone(),
            config.dry_run,
            config.chain_id,
            predict_exchange_address,
        )),
    );
    clients.insert(
        Platform::Probable,
        VenueClient::Probable(crate::clients::probable::ProbableClient::new(
            http.clone(),
            probable_base_url,
            config.chain_id,
            signer.clone(),
            probable_api_key,
            probable_api_secret,
            config.dry_run,
        )),
    );
    clients.insert(
        Platform::Opinion,
        VenueClient::Opinion(crate::clients::opinion::OpinionClient::new(http, opinion_base_url, opinion_api_key, config.dry_run)),
    );
    clients
}

// Placeholder base-url resolvers: these are venue endpoints supplied via
// config in a full deployment. Kept as free functions so `refresh_quotes`
// reads cleanly; wired to `Config` fields by the binary's CLI layer.
fn predict_base_url() -> String {
    std::env::var("PREDICT_BASE_URL").unwrap_or_else(|_| "https://predict.example".to_string())
}
fn probable_base_url() -> String {
    std::env::var("PROBABLE_BASE_URL").unwrap_or_else(|_| "https://probable.example".to_string())
}
fn opinion_base_url() -> String {
    std::env::var("OPINION_BASE_URL").unwrap_or_else(|_| "https://opinion.example".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiscoveredMarket, Fingerprint};
    use rust_decimal_macros::dec;

    fn market(id: &str, platform: Platform) -> DiscoveredMarket {
        DiscoveredMarket {
            id: id.to_string(),
            platform,
            title: "title".to_string(),
            condition_id: None,
            category: None,
            resolves_at: None,
            yes_token_id: format!("{id}-yes"),
            no_token_id: format!("{id}-no"),
            outcome_labels: ["Yes".to_string(), "No".to_string()],
            image: None,
            url: None,
        }
    }

    fn opportunity() -> ArbitOpportunity {
        ArbitOpportunity {
            market_id: Fingerprint::new("fp-1"),
            protocol_a: Platform::Predict,
            protocol_b: Platform::Probable,
            buy_yes_on_a: true,
            yes_price_a: dec!(0.55),
            no_price_b: dec!(0.40),
            total_cost: dec!(0.95),
            guaranteed_payout: dec!(1),
            spread_bps: 125,
            gross_spread_bps: 500,
            fees_deducted: dec!(1),
            est_profit: dec!(10),
            liquidity_a: dec!(1000),
            liquidity_b: dec!(500),
            polarity_flip: false,
            quoted_at: Utc::now(),
            shares: dec!(800),
        }
    }

    #[test]
    fn tokens_for_resolves_both_legs_in_opportunity_direction() {
        let mut snapshot = DiscoveryResult::default();
        let fp = Fingerprint::new("fp-1");
        snapshot.predict.insert(fp.clone(), market("predict-1", Platform::Predict));
        snapshot.probable.insert(fp, market("probable-1", Platform::Probable));

        let opp = opportunity();
        let (token_a, token_b) = tokens_for(&snapshot, &opp).expect("both legs present");
        assert_eq!(token_a, "predict-1-yes");
        assert_eq!(token_b, "probable-1-no");
    }

    #[test]
    fn tokens_for_returns_none_when_a_leg_is_missing() {
        let snapshot = DiscoveryResult::default();
        let opp = opportunity();
        assert!(tokens_for(&snapshot, &opp).is_none());
    }
}
