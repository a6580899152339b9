//! C10 — the sequential two-leg executor. Given a sized `ArbitOpportunity`,
//! place the thinner-liquidity leg first as an IOC/FOK order, confirm its
//! fill, then place the second leg only once the first is confirmed. Every
//! partial-failure path is recorded rather than swallowed: a half-filled
//! leg becomes a `Position` with `closed = false`, and its cost feeds the
//! daily loss breaker.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::clients::{PlaceOrderRequest, VenueClient};
use crate::config::Config;
use crate::metrics::Metrics;
use crate::types::{ArbitOpportunity, OrderStatus, Platform, Position, Side};

/// Outcome of one `execute` call. Every variant that touches money carries
/// enough detail for the caller to update the persisted ledger.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Both legs filled. `position.closed` is always `false` — resolution
    /// payout collection is not this agent's job (see Non-goals).
    Filled(Position),
    /// Leg 1 filled, leg 2 failed or was never confirmed. The position is
    /// recorded with `shares_b = 0, cost_b = 0` and remains open.
    PartialFailure(Position),
    /// Leg 1 did not fill (or filled zero shares); no position was opened.
    Aborted { reason: String },
    /// The daily loss breaker is tripped, or the opportunity failed a
    /// pre-flight check; no network calls were made.
    Rejected { reason: String },
}

struct DailyLoss {
    day: NaiveDate,
    total: Decimal,
}

impl DailyLoss {
    fn new() -> Self {
        Self { day: Utc::now().date_naive(), total: Decimal::ZERO }
    }

    fn roll_if_new_day(&mut self) {
        let today = Utc::now().date_naive();
        if today != self.day {
            self.day = today;
            self.total = Decimal::ZERO;
        }
    }
}

/// One leg's trading context: which venue, which outcome token, and the
/// price/liquidity the scanner already computed for it.
#[derive(Debug, Clone)]
pub struct LegContext {
    pub platform: Platform,
    pub token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub liquidity: Decimal,
}

pub struct Executor {
    clients: HashMap<Platform, VenueClient>,
    config: Config,
    metrics: Metrics,
    daily_loss: Mutex<DailyLoss>,
}

impl Executor {
    pub fn new(clients: HashMap<Platform, VenueClient>, config: Config, metrics: Metrics) -> Self {
        Self { clients, config, metrics, daily_loss: Mutex::new(DailyLoss::new()) }
    }

    /// §4.11 daily loss breaker: running net failure cost is tracked per
    /// UTC day; once it exceeds `dailyLossLimit` the executor rejects new
    /// opportunities until the day rolls over.
    pub async fn is_paused(&self) -> bool {
        let mut guard = self.daily_loss.lock().await;
        guard.roll_if_new_day();
        guard.total >= self.config.daily_loss_limit
    }

    async fn record_loss(&self, amount: Decimal) {
        self.metrics.add_daily_loss(amount.to_u64().unwrap_or(0));
        let mut guard = self.daily_loss.lock().await;
        guard.roll_if_new_day();
        guard.total += amount;
        if guard.total >= self.config.daily_loss_limit {
            warn!(
                daily_loss = %guard.total,
                limit = %self.config.daily_loss_limit,
                "daily loss limit breached, circuit breaker tripped"
            );
        }
    }

    /// Build the two `LegContext`s for an opportunity given the yes/no
    /// token ids the caller looked up from the discovery map, in the
    /// opportunity's own A/B order (leg ordering happens inside `execute`).
    pub fn legs_for(
        opportunity: &ArbitOpportunity,
        token_a: impl Into<String>,
        token_b: impl Into<String>,
    ) -> (LegContext, LegContext) {
        let (side_a, side_b) = if opportunity.buy_yes_on_a {
            (Side::Yes, Side::No)
        } else {
            (Side::No, Side::Yes)
        };
        let leg_a = LegContext {
            platform: opportunity.protocol_a,
            token_id: token_a.into(),
            side: side_a,
            price: opportunity.yes_price_a,
            liquidity: opportunity.liquidity_a,
        };
        let leg_b = LegContext {
            platform: opportunity.protocol_b,
            token_id: token_b.into(),
            side: side_b,
            price: opportunity.no_price_b,
            liquidity: opportunity.liquidity_b,
        };
        (leg_a, leg_b)
    }

    pub async fn execute(&self, opportunity: &ArbitOpportunity, leg_a: LegContext, leg_b: LegContext) -> ExecutionOutcome {
        if self.is_paused().await {
            return ExecutionOutcome::Rejected {
                reason: "daily loss circuit breaker is tripped".to_string(),
            };
        }

        // The unreliable (thinner-liquidity) leg goes first.
        let (first, second) = if leg_a.liquidity <= leg_b.liquidity { (leg_a, leg_b) } else { (leg_b, leg_a) };

        let Some(first_client) = self.clients.get(&first.platform) else {
            return ExecutionOutcome::Rejected { reason: format!("no client configured for {}", first.platform) };
        };

        let place1 = self
            .place_and_confirm(first_client, &first, opportunity.shares)
            .await;

        let Some((order1_id, filled1)) = place1 else {
            self.metrics.inc_trades_failed();
            return ExecutionOutcome::Aborted { reason: "leg 1 placement or confirmation failed".to_string() };
        };

        if filled1 <= Decimal::ZERO {
            self.metrics.inc_trades_failed();
            return ExecutionOutcome::Aborted { reason: "leg 1 filled zero shares".to_string() };
        }

        let cost1 = filled1 * first.price;
        info!(order_id = %order1_id, shares = %filled1, cost = %cost1, venue = %first.platform, "leg 1 filled");

        let Some(second_client) = self.clients.get(&second.platform) else {
            self.record_loss(cost1).await;
            self.metrics.inc_trades_partial();
            return ExecutionOutcome::PartialFailure(self.partial_position(opportunity, &first, &second, filled1, cost1));
        };

        let place2 = self.place_and_confirm(second_client, &second, filled1).await;

        match place2 {
            Some((order2_id, filled2)) if filled2 > Decimal::ZERO => {
                let cost2 = filled2 * second.price;
                info!(order_id = %order2_id, shares = %filled2, cost = %cost2, venue = %second.platform, "leg 2 filled");
                self.metrics.inc_trades_executed();
                ExecutionOutcome::Filled(self.full_position(opportunity, &first, &second, filled1, cost1, filled2, cost2))
            }
            _ => {
                warn!(venue = %second.platform, "leg 2 failed after leg 1 confirmed; recording partial-execution incident");
                self.record_loss(cost1).await;
                self.metrics.inc_trades_partial();
                ExecutionOutcome::PartialFailure(self.partial_position(opportunity, &first, &second, filled1, cost1))
            }
        }
    }

    /// Place one leg as an IOC/FOK order and poll for its terminal status.
    /// Returns `None` on placement failure or an unconfirmable timeout;
    /// otherwise `Some((order_id, filled_size))`.
    async fn place_and_confirm(
        &self,
        client: &VenueClient,
        leg: &LegContext,
        size: Decimal,
    ) -> Option<(String, Decimal)> {
        let req = PlaceOrderRequest {
            token_id: leg.token_id.clone(),
            side: leg.side,
            price: leg.price,
            size,
            expiration_sec: self.config.order_expiration_sec,
        };

        let result = match client.place_order(&req).await {
            Ok(r) if r.success => r,
            Ok(r) => {
                warn!(order_id = %r.order_id, venue = %leg.platform, "order placement reported failure");
                return None;
            }
            Err(e) => {
                warn!(error = %e, venue = %leg.platform, "order placement errored");
                return None;
            }
        };

        if self.config.dry_run {
            return Some((result.order_id, size));
        }

        let status = self.poll_fill(client, &result.order_id).await;
        match status.status {
            OrderStatus::Filled => Some((result.order_id, if status.filled_size > Decimal::ZERO { status.filled_size } else { size })),
            OrderStatus::Partial if status.filled_size > Decimal::ZERO => Some((result.order_id, status.filled_size)),
            _ => None,
        }
    }

    /// Poll `getOrderStatus` every `fillPollIntervalMs` until a terminal
    /// status or `fillPollTimeoutMs` elapses. On timeout, consult
    /// `getOpenOrders`: if the order is no longer listed, classify it
    /// conservatively as cancelled; if still listed, leave it `Unknown`.
    async fn poll_fill(&self, client: &VenueClient, order_id: &str) -> crate::clients::OrderStatusResult {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.config.fill_poll_timeout_ms);
        loop {
            match client.get_order_status(order_id).await {
                Ok(status) if matches!(status.status, OrderStatus::Filled | OrderStatus::Partial | OrderStatus::Cancelled | OrderStatus::Expired) => {
                    return status;
                }
                Ok(_) | Err(_) => {}
            }

            if tokio::time::Instant::now() >= deadline {
                let open_orders = client.get_open_orders().await.unwrap_or_default();
                let still_open = open_orders.iter().any(|o| o.order_id == order_id);
                return crate::clients::OrderStatusResult {
                    order_id: order_id.to_string(),
                    status: if still_open { OrderStatus::Unknown } else { OrderStatus::Cancelled },
                    filled_size: Decimal::ZERO,
                };
            }

            tokio::time::sleep(Duration::from_millis(self.config.fill_poll_interval_ms)).await;
        }
    }

    fn full_position(
        &self,
        opportunity: &ArbitOpportunity,
        first: &LegContext,
        second: &LegContext,
        filled1: Decimal,
        cost1: Decimal,
        filled2: Decimal,
        cost2: Decimal,
    ) -> Position {
        let (shares_a, cost_a, shares_b, cost_b) = if first.platform == opportunity.protocol_a {
            (filled1, cost1, filled2, cost2)
        } else {
            (filled2, cost2, filled1, cost1)
        };
        Position {
            position_id: new_position_id(),
            protocol_a: opportunity.protocol_a,
            protocol_b: opportunity.protocol_b,
            market_id: opportunity.market_id.clone(),
            bought_yes_on_a: opportunity.buy_yes_on_a,
            shares_a,
            shares_b,
            cost_a,
            cost_b,
            opened_at: Utc::now(),
            closed: false,
        }
    }

    fn partial_position(
        &self,
        opportunity: &ArbitOpportunity,
        first: &LegContext,
        _second: &LegContext,
        filled1: Decimal,
        cost1: Decimal,
    ) -> Position {
        let (shares_a, cost_a, shares_b, cost_b) = if first.platform == opportunity.protocol_a {
            (filled1, cost1, Decimal::ZERO, Decimal::ZERO)
        } else {
            (Decimal::ZERO, Decimal::ZERO, filled1, cost1)
        };
        Position {
            position_id: new_position_id(),
            protocol_a: opportunity.protocol_a,
            protocol_b: opportunity.protocol_b,
            market_id: opportunity.market_id.clone(),
            bought_yes_on_a: opportunity.buy_yes_on_a,
            shares_a,
            shares_b,
            cost_a,
            cost_b,
            opened_at: Utc::now(),
            closed: false,
        }
    }
}

fn new_position_id() -> String {
    let suffix: u64 = rand::thread_rng().gen();
    format!("pos-{}-{:016x}", Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Fingerprint;
    use rust_decimal_macros::dec;

    fn opportunity() -> ArbitOpportunity {
        ArbitOpportunity {
            market_id: Fingerprint::new("fp-1"),
            protocol_a: Platform::Predict,
            protocol_b: Platform::Probable,
            buy_yes_on_a: true,
            yes_price_a: dec!(0.55),
            no_price_b: dec!(0.40),
            total_cost: dec!(0.95),
            guaranteed_payout: Decimal::ONE,
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
    fn leg_ordering_picks_smaller_liquidity_first() {
        let opp = opportunity();
        let (leg_a, leg_b) = Executor::legs_for(&opp, "token-a", "token-b");
        assert_eq!(leg_a.platform, Platform::Predict);
        assert_eq!(leg_b.platform, Platform::Probable);
        let (first, _second) = if leg_a.liquidity <= leg_b.liquidity { (leg_a, leg_b) } else { (leg_b, leg_a) };
        // liquidity_b (500) < liquidity_a (1000): Probable goes first.
        assert_eq!(first.platform, Platform::Probable);
    }

    #[test]
    fn legs_for_assigns_complementary_sides() {
        let opp = opportunity();
        let (leg_a, leg_b) = Executor::legs_for(&opp, "token-a", "token-b");
        assert_eq!(leg_a.side, Side::Yes);
        assert_eq!(leg_b.side, Side::No);
    }

    #[tokio::test]
    async fn daily_loss_breaker_trips_after_limit() {
        let mut config = Config::default();
        config.daily_loss_limit = dec!(100);
        let executor = Executor::new(HashMap::new(), config, Metrics::new());
        assert!(!executor.is_paused().await);
        executor.record_loss(dec!(150)).await;
        assert!(executor.is_paused().await);
    }

    #[tokio::test]
    async fn rejects_when_paused() {
        let mut config = Config::default();
        config.daily_loss_limit = dec!(1);
        let executor = Executor::new(HashMap::new(), config, Metrics::new());
        executor.record_loss(dec!(5)).await;
        let opp = opportunity();
        let (leg_a, leg_b) = Executor::legs_for(&opp, "token-a", "token-b");
        let outcome = executor.execute(&opp, leg_a, leg_b).await;
        assert!(matches!(outcome, ExecutionOutcome::Rejected { .. }));
    }
}
