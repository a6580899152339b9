//! Opinion execution client. Auth is a static API key header (no login
//! handshake); the nonce is server-managed and fetched fresh before each
//! order, like Predict.
//!
//! Decision (documented in the design ledger): a 404 from `getOrderStatus`
//! is treated as `Cancelled`, consistent with Predict — Opinion's order
//! endpoint also returns 404 once an order leaves the book for any reason
//! other than a fill, and fills are reported with a terminal `FILLED`
//! status while the order id is still resolvable.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::json;

use crate::clients::{OpenOrder, OrderStatusResult, PlaceOrderRequest, PlaceOrderResult};
use crate::error::AgentError;
use crate::retry::{with_retry, RetryConfig};
use crate::types::{OrderStatus, Side};

pub struct OpinionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct NonceResponse {
    nonce: u64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    order_id: String,
}

impl OpinionClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>, dry_run: bool) -> Self {
        Self { client, base_url: base_url.into(), api_key: api_key.into(), dry_run }
    }

    pub async fn authenticate(&self) -> Result<(), AgentError> {
        Ok(())
    }

    pub async fn fetch_nonce(&self) -> Result<u64, AgentError> {
        let resp = self
            .client
            .get(format!("{}/account/nonce", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| AgentError::from_network_error(&e))?;
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::from_status(resp.status().as_u16(), &body));
        }
        let body: NonceResponse = resp.json().await.map_err(|e| AgentError::from_network_error(&e))?;
        Ok(body.nonce)
    }

    pub async fn place_order(&self, req: &PlaceOrderRequest) -> Result<PlaceOrderResult, AgentError> {
        if self.dry_run {
            return Ok(PlaceOrderResult::dry_run());
        }

        let nonce = self.fetch_nonce().await?;
        let body = json!({
            "tokenId": req.token_id,
            "side": if matches!(req.side, Side::Yes) { "BUY" } else { "SELL" },
            "price": req.price.to_string(),
            "size": req.size.to_string(),
            "expiration": Utc::now().timestamp() as u64 + req.expiration_sec,
            "nonce": nonce,
        });

        let retry_cfg = RetryConfig::default();
        let resp = with_retry(&retry_cfg, "opinion.place_order", || {
            let client = self.client.clone();
            let api_key = self.api_key.clone();
            let body = body.clone();
            let base_url = self.base_url.clone();
            async move {
                let resp = client
                    .post(format!("{base_url}/order"))
                    .header("X-API-KEY", api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| AgentError::from_network_error(&e))?;
                let status = resp.status();
                if !status.is_success() {
                    let text = resp.text().await.unwrap_or_default();
                    return Err(AgentError::from_status(status.as_u16(), &text));
                }
                resp.json::<OrderResponse>().await.map_err(|e| AgentError::from_network_error(&e))
            }
        })
        .await?;

        Ok(PlaceOrderResult { success: true, order_id: resp.order_id, status: OrderStatus::Open })
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<(), AgentError> {
        if self.dry_run {
            return Ok(());
        }
        let resp = self
            .client
            .delete(format!("{}/order/{}", self.base_url, order_id))
            .header("X-API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| AgentError::from_network_error(&e))?;
        if !resp.status().is_success() && resp.status().as_u16() != 404 {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::from_status(resp.status().as_u16(), &body));
        }
        Ok(())
    }

    pub async fn get_order_status(&self, order_id: &str) -> Result<OrderStatusResult, AgentError> {
        let resp = self
            .client
            .get(format!("{}/order/{}", self.base_url, order_id))
            .header("X-API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| AgentError::from_network_error(&e))?;

        if resp.status().as_u16() == 404 {
            return Ok(OrderStatusResult {
                order_id: order_id.to_string(),
                status: OrderStatus::Cancelled,
                filled_size: Decimal::ZERO,
            });
        }
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::from_status(resp.status().as_u16(), &body));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| AgentError::from_network_error(&e))?;
        let status = map_status(body.get("status").and_then(|v| v.as_str()).unwrap_or("unknown"));
        let filled_size = body
            .get("filledSize")
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse().ok())
            .unwrap_or(dec!(0));

        Ok(OrderStatusResult { order_id: order_id.to_string(), status, filled_size })
    }

    pub async fn ensure_approvals(&self) -> Result<(), AgentError> {
        Ok(())
    }

    pub async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, AgentError> {
        let resp = self
            .client
            .get(format!("{}/orders", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| AgentError::from_network_error(&e))?;
        if !resp.status().is_success() {
            return Ok(Vec::new());
        }
        let body: Vec<serde_json::Value> = resp.json().await.unwrap_or_default();
        Ok(body.iter().filter_map(parse_open_order).collect())
    }
}

fn parse_open_order(v: &serde_json::Value) -> Option<OpenOrder> {
    Some(OpenOrder {
        order_id: v.get("orderId")?.as_str()?.to_string(),
        token_id: v.get("tokenId")?.as_str()?.to_string(),
        side: if v.get("side")?.as_str()? == "BUY" { Side::Yes } else { Side::No },
        price: v.get("price")?.as_str()?.parse().ok()?,
        size: v.get("size")?.as_str()?.parse().ok()?,
    })
}

fn map_status(raw: &str) -> OrderStatus {
    match raw.to_uppercase().as_str() {
        "FILLED" => OrderStatus::Filled,
        "OPEN" => OrderStatus::Open,
        "PARTIAL" => OrderStatus::Partial,
        "CANCELLED" | "CANCELED" => OrderStatus::Cancelled,
        "EXPIRED" => OrderStatus::Expired,
        _ => OrderStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_known_values() {
        assert_eq!(map_status("FILLED"), OrderStatus::Filled);
        assert_eq!(map_status("EXPIRED"), OrderStatus::Expired);
        assert_eq!(map_status("nonsense"), OrderStatus::Unknown);
    }
}
