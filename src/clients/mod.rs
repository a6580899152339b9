//! C9 — execution clients. Each venue gets a concrete client type with the
//! same capability set (authenticate, fetch a nonce, place/cancel an order,
//! poll order status, list open orders, ensure approvals); there is no
//! shared trait since each venue only ever has one concrete implementation.

pub mod opinion;
pub mod predict;
pub mod probable;
pub mod signing;

use rust_decimal::Decimal;

use crate::error::AgentError;
use crate::types::{OrderStatus, Platform, Side};

use opinion::OpinionClient;
use predict::PredictClient;
use probable::ProbableClient;

#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub expiration_sec: u64,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderResult {
    pub success: bool,
    pub order_id: String,
    pub status: OrderStatus,
}

impl PlaceOrderResult {
    /// The dry-run short-circuit result: no network call is made, and the
    /// venue's nonce state is left untouched.
    pub fn dry_run() -> Self {
        Self {
            success: true,
            order_id: "dry-run".to_string(),
            status: OrderStatus::Open,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderStatusResult {
    pub order_id: String,
    pub status: OrderStatus,
    pub filled_size: Decimal,
}

/// One row of a venue's "my open orders" listing, per the C9 capability
/// set. Used by the executor's timeout fallback path: if `getOrderStatus`
/// times out, `getOpenOrders` is consulted before conservatively
/// classifying the order as cancelled.
#[derive(Debug, Clone)]
pub struct OpenOrder {
    pub order_id: String,
    pub token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

/// Runtime dispatch over the three concrete clients, one per `Platform`.
/// Each venue has exactly one implementation, so this is a plain enum
/// match rather than a `dyn` trait object — the executor holds one
/// `VenueClient` per platform and looks it up by `Platform` at call time.
pub enum VenueClient {
    Predict(PredictClient),
    Probable(ProbableClient),
    Opinion(OpinionClient),
}

impl VenueClient {
    pub fn platform(&self) -> Platform {
        match self {
            VenueClient::Predict(_) => Platform::Predict,
            VenueClient::Probable(_) => Platform::Probable,
            VenueClient::Opinion(_) => Platform::Opinion,
        }
    }

    pub async fn authenticate(&self) -> Result<(), AgentError> {
        match self {
            VenueClient::Predict(c) => c.authenticate().await,
            VenueClient::Probable(c) => c.authenticate().await,
            VenueClient::Opinion(c) => c.authenticate().await,
        }
    }

    pub async fn ensure_approvals(&self) -> Result<(), AgentError> {
        match self {
            VenueClient::Predict(c) => c.ensure_approvals().await,
            VenueClient::Probable(c) => c.ensure_approvals().await,
            VenueClient::Opinion(c) => c.ensure_approvals().await,
        }
    }

    pub async fn place_order(&self, req: &PlaceOrderRequest) -> Result<PlaceOrderResult, AgentError> {
        match self {
            VenueClient::Predict(c) => c.place_order(req).await,
            VenueClient::Probable(c) => c.place_order(req).await,
            VenueClient::Opinion(c) => c.place_order(req).await,
        }
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<(), AgentError> {
        match self {
            VenueClient::Predict(c) => c.cancel_order(order_id).await,
            VenueClient::Probable(c) => c.cancel_order(order_id).await,
            VenueClient::Opinion(c) => c.cancel_order(order_id).await,
        }
    }

    pub async fn get_order_status(&self, order_id: &str) -> Result<OrderStatusResult, AgentError> {
        match self {
            VenueClient::Predict(c) => c.get_order_status(order_id).await,
            VenueClient::Probable(c) => c.get_order_status(order_id).await,
            VenueClient::Opinion(c) => c.get_order_status(order_id).await,
        }
    }

    pub async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, AgentError> {
        match self {
            VenueClient::Predict(c) => c.get_open_orders().await,
            VenueClient::Probable(c) => c.get_open_orders().await,
            VenueClient::Opinion(c) => c.get_open_orders().await,
        }
    }
}
