//! Order signing helpers shared by the three execution clients: EIP-712
//! order-hash signing for the on-chain leg, and HMAC request signing for
//! venues that authenticate REST calls that way.

use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AgentError;

type HmacSha256 = Hmac<Sha256>;

const DOMAIN_TYPE_PREIMAGE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const ORDER_TYPE_PREIMAGE: &[u8] = b"Order(uint256 salt,address maker,address signer,address taker,uint256 tokenId,uint256 makerAmount,uint256 takerAmount,uint256 expiration,uint256 nonce,uint256 feeRateBps,uint8 side,uint8 signatureType)";

/// The EIP-712 domain an `Order` is signed against: one per venue exchange
/// contract (`name`/`verifyingContract` vary, `version` is always `"1"`).
#[derive(Debug, Clone)]
pub struct OrderDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

/// The full on-chain `Order` struct per §4.10/§6 — field order matches
/// `ORDER_TYPE_PREIMAGE` exactly, since the struct hash is order-sensitive.
#[derive(Debug, Clone)]
pub struct Order {
    pub salt: u64,
    pub maker: Address,
    pub signer: Address,
    pub taker: Address,
    pub token_id: U256,
    pub maker_amount: U256,
    pub taker_amount: U256,
    pub expiration: u64,
    pub nonce: U256,
    pub fee_rate_bps: u32,
    pub side: u8,
    pub signature_type: u8,
}

fn left_pad_address(addr: Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(addr.as_slice());
    out
}

fn domain_separator(domain: &OrderDomain) -> B256 {
    let type_hash = keccak256(DOMAIN_TYPE_PREIMAGE);
    let name_hash = keccak256(domain.name.as_bytes());
    let version_hash = keccak256(domain.version.as_bytes());

    let mut data = Vec::with_capacity(32 * 5);
    data.extend_from_slice(type_hash.as_slice());
    data.extend_from_slice(name_hash.as_slice());
    data.extend_from_slice(version_hash.as_slice());
    data.extend_from_slice(&U256::from(domain.chain_id).to_be_bytes::<32>());
    data.extend_from_slice(&left_pad_address(domain.verifying_contract));
    keccak256(&data)
}

fn order_struct_hash(order: &Order) -> B256 {
    let type_hash = keccak256(ORDER_TYPE_PREIMAGE);

    let mut data = Vec::with_capacity(32 * 13);
    data.extend_from_slice(type_hash.as_slice());
    data.extend_from_slice(&U256::from(order.salt).to_be_bytes::<32>());
    data.extend_from_slice(&left_pad_address(order.maker));
    data.extend_from_slice(&left_pad_address(order.signer));
    data.extend_from_slice(&left_pad_address(order.taker));
    data.extend_from_slice(&order.token_id.to_be_bytes::<32>());
    data.extend_from_slice(&order.maker_amount.to_be_bytes::<32>());
    data.extend_from_slice(&order.taker_amount.to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(order.expiration).to_be_bytes::<32>());
    data.extend_from_slice(&order.nonce.to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(order.fee_rate_bps).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(order.side).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(order.signature_type).to_be_bytes::<32>());
    keccak256(&data)
}

/// Build the domain separator + `Order` struct hash, fold them into the
/// `0x1901`-prefixed EIP-712 signing digest, and sign with the configured
/// EOA. Mirrors the domain-separator/struct-hash/keccak256(0x1901 ‖ ..)
/// shape used for Safe transaction hashing.
pub async fn sign_order(signer: &PrivateKeySigner, domain: &OrderDomain, order: &Order) -> Result<String, AgentError> {
    let domain_sep = domain_separator(domain);
    let struct_hash = order_struct_hash(order);

    let mut final_data = Vec::with_capacity(2 + 32 + 32);
    final_data.push(0x19);
    final_data.push(0x01);
    final_data.extend_from_slice(domain_sep.as_slice());
    final_data.extend_from_slice(struct_hash.as_slice());
    let digest = keccak256(&final_data);

    let signature = signer
        .sign_hash(&digest)
        .await
        .map_err(|e| AgentError::Auth(format!("failed to sign order: {e}")))?;

    Ok(format!("0x{}", hex::encode(signature.as_bytes())))
}

/// HMAC-SHA256 request signature used by the Probable and Opinion REST
/// APIs: `sign(timestamp + method + path + body)`, base64url-encoded.
pub fn hmac_headers(
    secret_b64: &str,
    method: &str,
    path: &str,
    body: &str,
    timestamp_ms: i64,
) -> Result<(String, String), AgentError> {
    let sig_payload = format!("{timestamp_ms}{method}{path}{body}");

    let secret_bytes = base64::engine::general_purpose::STANDARD
        .decode(secret_b64)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(secret_b64))
        .map_err(|e| AgentError::Auth(format!("invalid HMAC secret encoding: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(&secret_bytes)
        .map_err(|e| AgentError::Auth(format!("invalid HMAC secret length: {e}")))?;
    mac.update(sig_payload.as_bytes());
    let signature = base64::engine::general_purpose::URL_SAFE.encode(mac.finalize().into_bytes());

    Ok((timestamp_ms.to_string(), signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> OrderDomain {
        OrderDomain {
            name: "Predict CTF Exchange".to_string(),
            version: "1".to_string(),
            chain_id: 137,
            verifying_contract: Address::ZERO,
        }
    }

    fn order() -> Order {
        Order {
            salt: 42,
            maker: Address::ZERO,
            signer: Address::ZERO,
            taker: Address::ZERO,
            token_id: U256::from(7u64),
            maker_amount: U256::from(550_000_000_000_000_000u128),
            taker_amount: U256::from(1_000_000_000_000_000_000u128),
            expiration: 1_700_000_300,
            nonce: U256::from(1u64),
            fee_rate_bps: 0,
            side: 0,
            signature_type: 0,
        }
    }

    #[test]
    fn domain_separator_changes_with_verifying_contract() {
        let mut other = domain();
        other.verifying_contract = Address::from([0x11; 20]);
        assert_ne!(domain_separator(&domain()), domain_separator(&other));
    }

    #[test]
    fn struct_hash_is_deterministic() {
        assert_eq!(order_struct_hash(&order()), order_struct_hash(&order()));
    }

    #[test]
    fn struct_hash_changes_with_side() {
        let mut flipped = order();
        flipped.side = 1;
        assert_ne!(order_struct_hash(&order()), order_struct_hash(&flipped));
    }

    #[tokio::test]
    async fn sign_order_produces_a_hex_signature() {
        let signer = PrivateKeySigner::random();
        let sig = sign_order(&signer, &domain(), &order()).await.unwrap();
        assert!(sig.starts_with("0x"));
        assert_eq!(sig.len(), 2 + 65 * 2);
    }

    #[test]
    fn hmac_headers_are_deterministic_for_same_input() {
        let secret = base64::engine::general_purpose::STANDARD.encode("super-secret-key");
        let (ts1, sig1) = hmac_headers(&secret, "POST", "/orders", "{}", 1_700_000_000_000).unwrap();
        let (ts2, sig2) = hmac_headers(&secret, "POST", "/orders", "{}", 1_700_000_000_000).unwrap();
        assert_eq!(ts1, ts2);
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn hmac_headers_differ_for_different_paths() {
        let secret = base64::engine::general_purpose::STANDARD.encode("super-secret-key");
        let (_, sig1) = hmac_headers(&secret, "POST", "/orders", "{}", 1_700_000_000_000).unwrap();
        let (_, sig2) = hmac_headers(&secret, "POST", "/cancel", "{}", 1_700_000_000_000).unwrap();
        assert_ne!(sig1, sig2);
    }
}
