//! Predict execution client. Auth is a short-lived JWT obtained by signing
//! a login challenge with the EOA key; the nonce is server-managed (each
//! `place_order` call fetches the current value first).
//!
//! Decision (documented in the design ledger): a 404 from `getOrderStatus`
//! is treated as `Cancelled` — Predict removes an order from its book
//! entirely once it is no longer resting, rather than leaving a terminal
//! record behind.

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::clients::signing::{sign_order, Order, OrderDomain};
use crate::clients::{OpenOrder, OrderStatusResult, PlaceOrderRequest, PlaceOrderResult};
use crate::error::AgentError;
use crate::retry::{with_retry, RetryConfig};
use crate::types::{OrderStatus, Side};

/// Order signature type for a plain EOA wallet (no proxy/Safe wrapper).
const SIGNATURE_TYPE_EOA: u8 = 0;
/// On-chain order side: this agent only ever opens positions by buying
/// shares, never sells to close, so every signed order is a BUY. `req.side`
/// (YES/NO) already selects which outcome token via `req.token_id`.
const ORDER_SIDE_BUY: u8 = 0;

/// A buffer subtracted from the parsed JWT expiry so `bearer()` refreshes
/// slightly ahead of the server actually rejecting the token.
const EXPIRY_SKEW_SECS: i64 = 10;

struct Credentials {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    fn is_valid(&self) -> bool {
        match self.expires_at {
            Some(exp) => Utc::now() + chrono::Duration::seconds(EXPIRY_SKEW_SECS) < exp,
            None => true,
        }
    }
}

pub struct PredictClient {
    client: reqwest::Client,
    base_url: String,
    signer: PrivateKeySigner,
    dry_run: bool,
    jwt: tokio::sync::Mutex<Option<Credentials>>,
    domain: OrderDomain,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

/// Pulls the `exp` claim out of the login JWT without verifying its
/// signature — the token was just handed to us over TLS by the venue we
/// requested it from, and we only need the expiry to schedule a refresh.
fn parse_jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    let key = DecodingKey::from_secret(&[]);
    let claims = decode::<JwtClaims>(token, &key, &validation).ok()?.claims;
    claims.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single())
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct NonceResponse {
    nonce: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    order_id: String,
    #[serde(default)]
    status: Option<String>,
}

impl PredictClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        signer: PrivateKeySigner,
        dry_run: bool,
        chain_id: u64,
        exchange_address: Address,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            signer,
            dry_run,
            jwt: tokio::sync::Mutex::new(None),
            domain: OrderDomain {
                name: "Predict CTF Exchange".to_string(),
                version: "1".to_string(),
                chain_id,
                verifying_contract: exchange_address,
            },
        }
    }

    pub async fn authenticate(&self) -> Result<(), AgentError> {
        let mut guard = self.jwt.lock().await;
        if guard.as_ref().is_some_and(Credentials::is_valid) {
            return Ok(());
        }
        let address = format!("{:?}", self.signer.address());
        let timestamp = Utc::now().timestamp();
        let challenge = format!("predict-login:{address}:{timestamp}");
        let signature = self
            .signer
            .sign_message(challenge.as_bytes())
            .await
            .map_err(|e| AgentError::Auth(format!("login signature failed: {e}")))?;

        let resp = self
            .client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&serde_json::json!({
                "address": address,
                "timestamp": timestamp,
                "signature": format!("0x{}", hex::encode(signature.as_bytes())),
            }))
            .send()
            .await
            .map_err(|e| AgentError::from_network_error(&e))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::from_status(resp.status().as_u16(), &body));
        }

        let login: LoginResponse = resp.json().await.map_err(|e| AgentError::from_network_error(&e))?;
        let expires_at = parse_jwt_expiry(&login.token);
        *guard = Some(Credentials { token: login.token, expires_at });
        Ok(())
    }

    async fn bearer(&self) -> Result<String, AgentError> {
        self.authenticate().await?;
        let guard = self.jwt.lock().await;
        guard
            .as_ref()
            .map(|c| c.token.clone())
            .ok_or_else(|| AgentError::Auth("not authenticated".to_string()))
    }

    pub async fn fetch_nonce(&self) -> Result<alloy::primitives::U256, AgentError> {
        let token = self.bearer().await?;
        let resp = self
            .client
            .get(format!("{}/v1/orders/nonce", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AgentError::from_network_error(&e))?;
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::from_status(resp.status().as_u16(), &body));
        }
        let body: NonceResponse = resp.json().await.map_err(|e| AgentError::from_network_error(&e))?;
        body.nonce
            .parse()
            .map_err(|_| AgentError::validation("nonce response was not a valid integer"))
    }

    pub async fn place_order(&self, req: &PlaceOrderRequest) -> Result<PlaceOrderResult, AgentError> {
        if self.dry_run {
            return Ok(PlaceOrderResult::dry_run());
        }

        let nonce = self.fetch_nonce().await?;
        let address = self.signer.address();
        let token_id = U256::from_str_radix(&req.token_id, 10)
            .map_err(|_| AgentError::validation("tokenId was not a valid integer"))?;

        // BUY: maker pays the USDT notional, taker side delivers the
        // shares. This agent never signs a SELL order (see ORDER_SIDE_BUY).
        let maker_amount = decimal_to_u256_1e18(req.price * req.size);
        let taker_amount = decimal_to_u256_1e18(req.size);

        let order = Order {
            salt: rand::random::<u64>(),
            maker: address,
            signer: address,
            taker: Address::ZERO,
            token_id,
            maker_amount,
            taker_amount,
            expiration: Utc::now().timestamp() as u64 + req.expiration_sec,
            nonce,
            fee_rate_bps: 0,
            side: ORDER_SIDE_BUY,
            signature_type: SIGNATURE_TYPE_EOA,
        };
        let signature = sign_order(&self.signer, &self.domain, &order).await?;
        let token = self.bearer().await?;

        let retry_cfg = RetryConfig::default();
        let resp = with_retry(&retry_cfg, "predict.place_order", || {
            let client = self.client.clone();
            let token = token.clone();
            let order = order.clone();
            let signature = signature.clone();
            async move {
                let resp = client
                    .post(format!("{}/v1/orders", self.base_url))
                    .bearer_auth(token)
                    .json(&serde_json::json!({
                        "salt": order.salt.to_string(),
                        "maker": format!("{:?}", order.maker),
                        "signer": format!("{:?}", order.signer),
                        "taker": format!("{:?}", order.taker),
                        "tokenId": order.token_id.to_string(),
                        "makerAmount": order.maker_amount.to_string(),
                        "takerAmount": order.taker_amount.to_string(),
                        "expiration": order.expiration,
                        "nonce": order.nonce.to_string(),
                        "feeRateBps": order.fee_rate_bps,
                        "side": if order.side == 0 { "BUY" } else { "SELL" },
                        "signatureType": order.signature_type,
                        "signature": signature,
                    }))
                    .send()
                    .await
                    .map_err(|e| AgentError::from_network_error(&e))?;
                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AgentError::from_status(status.as_u16(), &body));
                }
                resp.json::<OrderResponse>().await.map_err(|e| AgentError::from_network_error(&e))
            }
        })
        .await?;

        Ok(PlaceOrderResult {
            success: true,
            order_id: resp.order_id,
            status: OrderStatus::Open,
        })
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<(), AgentError> {
        if self.dry_run {
            return Ok(());
        }
        let token = self.bearer().await?;
        let resp = self
            .client
            .delete(format!("{}/v1/orders/{}", self.base_url, order_id))
            .bearer_auth(token)
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
        let token = self.bearer().await?;
        let resp = self
            .client
            .get(format!("{}/v1/orders/{}", self.base_url, order_id))
            .bearer_auth(token)
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
        // Predict markets settle through a CLOB, not direct vault transfers;
        // approvals are a one-time on-chain allowance set against the
        // exchange contract and are out of scope for the scanning/execution
        // loop itself.
        Ok(())
    }

    pub async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, AgentError> {
        let Ok(token) = self.bearer().await else {
            return Ok(Vec::new());
        };
        let address = format!("{:?}", self.signer.address());
        let resp = self
            .client
            .get(format!("{}/v1/orders", self.base_url))
            .query(&[("address", address.as_str()), ("status", "OPEN")])
            .bearer_auth(token)
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
        "FILLED" | "MATCHED" => OrderStatus::Filled,
        "OPEN" | "LIVE" | "RESTING" => OrderStatus::Open,
        "PARTIAL" | "PARTIALLY_FILLED" => OrderStatus::Partial,
        "CANCELLED" | "CANCELED" => OrderStatus::Cancelled,
        "EXPIRED" => OrderStatus::Expired,
        _ => OrderStatus::Unknown,
    }
}

fn decimal_to_u256_1e18(value: Decimal) -> alloy::primitives::U256 {
    let scaled = (value * dec!(1_000_000_000_000_000_000)).trunc();
    alloy::primitives::U256::from_str_radix(&scaled.to_string(), 10).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_synonyms_map_to_normalized_values() {
        assert_eq!(map_status("MATCHED"), OrderStatus::Filled);
        assert_eq!(map_status("LIVE"), OrderStatus::Open);
        assert_eq!(map_status("PARTIALLY_FILLED"), OrderStatus::Partial);
        assert_eq!(map_status("weird"), OrderStatus::Unknown);
    }

    #[test]
    fn decimal_scaling_round_trips_whole_values() {
        let scaled = decimal_to_u256_1e18(dec!(0.55));
        assert_eq!(scaled, alloy::primitives::U256::from(550_000_000_000_000_000u128));
    }
}
