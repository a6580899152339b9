//! Configuration loading. Mirrors the teacher's explicit
//! `env::var(...).ok().and_then(...).unwrap_or(default)` chains — no
//! process-wide config singleton, no module-level env reads; every value is
//! produced once by `Config::from_env()` and passed down explicitly.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    Clob,
    Vault,
}

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub vault_address: String,
    pub adapter_a_address: String,
    pub adapter_b_address: String,
    pub usdt_address: String,
    pub market_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub private_key: Option<String>,
    pub chain_id: u64,
    pub execution_mode: ExecutionMode,
    pub vault: Option<VaultConfig>,

    pub min_spread_bps: i64,
    pub max_spread_bps: i64,
    pub max_position_size: Decimal,

    pub scan_interval_ms: u64,
    pub order_expiration_sec: u64,
    pub fill_poll_interval_ms: u64,
    pub fill_poll_timeout_ms: u64,

    pub daily_loss_limit: Decimal,
    pub matching_similarity_threshold: f64,
    pub matching_confidence_threshold: f64,

    pub dry_run: bool,
    pub auto_discover: bool,
    pub yield_rotation_enabled: bool,

    pub api_key: Option<String>,
    pub port: u16,

    pub min_liquidity: Decimal,
    pub freshness_max_secs: i64,
    pub provider_concurrency: usize,

    /// The Predict CLOB exchange contract, used as the EIP-712
    /// `verifyingContract` for order signing. Defaults to the zero address
    /// so `check-config`/dry-run flows don't require it.
    pub predict_exchange_address: String,

    /// Caps trades executed within one process lifetime; `None` means
    /// unbounded. Distinct from `daily_loss_limit`, which trips on realized
    /// loss rather than trade count.
    pub max_trades_per_session: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            private_key: None,
            chain_id: 31337,
            execution_mode: ExecutionMode::Clob,
            vault: None,
            min_spread_bps: 100,
            max_spread_bps: 10_000,
            max_position_size: dec!(500),
            scan_interval_ms: 5_000,
            order_expiration_sec: 300,
            fill_poll_interval_ms: 5_000,
            fill_poll_timeout_ms: 60_000,
            daily_loss_limit: dec!(50),
            matching_similarity_threshold: 0.85,
            matching_confidence_threshold: 0.90,
            dry_run: true,
            auto_discover: true,
            yield_rotation_enabled: false,
            api_key: None,
            port: 3001,
            min_liquidity: dec!(1),
            freshness_max_secs: 30,
            provider_concurrency: 10,
            max_trades_per_session: None,
            predict_exchange_address: "0x0000000000000000000000000000000000000000".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, AgentError> {
        dotenvy::dotenv().ok();

        let mut cfg = Config::default();

        cfg.rpc_url =
            std::env::var("RPC_URL").map_err(|_| AgentError::config("RPC_URL is required"))?;
        cfg.private_key = std::env::var("PRIVATE_KEY").ok();
        cfg.chain_id = env_parse("CHAIN_ID").unwrap_or(cfg.chain_id);

        cfg.dry_run = env_bool("DRY_RUN", cfg.dry_run);
        cfg.auto_discover = env_bool("AUTO_DISCOVER", cfg.auto_discover);
        cfg.yield_rotation_enabled =
            env_bool("YIELD_ROTATION_ENABLED", cfg.yield_rotation_enabled);

        if !cfg.dry_run && cfg.private_key.is_none() {
            return Err(AgentError::config(
                "PRIVATE_KEY is required when DRY_RUN is false",
            ));
        }

        cfg.execution_mode = match std::env::var("EXECUTION_MODE").as_deref() {
            Ok("vault") => ExecutionMode::Vault,
            _ => ExecutionMode::Clob,
        };

        if cfg.execution_mode == ExecutionMode::Vault {
            cfg.vault = Some(VaultConfig {
                vault_address: std::env::var("VAULT_ADDRESS")
                    .map_err(|_| AgentError::config("VAULT_ADDRESS required in vault mode"))?,
                adapter_a_address: std::env::var("ADAPTER_A_ADDRESS")
                    .map_err(|_| AgentError::config("ADAPTER_A_ADDRESS required in vault mode"))?,
                adapter_b_address: std::env::var("ADAPTER_B_ADDRESS")
                    .map_err(|_| AgentError::config("ADAPTER_B_ADDRESS required in vault mode"))?,
                usdt_address: std::env::var("USDT_ADDRESS")
                    .map_err(|_| AgentError::config("USDT_ADDRESS required in vault mode"))?,
                market_id: std::env::var("VAULT_MARKET_ID")
                    .map_err(|_| AgentError::config("VAULT_MARKET_ID required in vault mode"))?,
            });
        }

        cfg.min_spread_bps = env_parse("MIN_SPREAD_BPS").unwrap_or(cfg.min_spread_bps);
        cfg.max_spread_bps = env_parse("MAX_SPREAD_BPS").unwrap_or(cfg.max_spread_bps);
        cfg.max_position_size = std::env::var("MAX_POSITION_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(cfg.max_position_size);

        cfg.scan_interval_ms = env_parse("SCAN_INTERVAL_MS").unwrap_or(cfg.scan_interval_ms);
        cfg.order_expiration_sec =
            env_parse("ORDER_EXPIRATION_SEC").unwrap_or(cfg.order_expiration_sec);
        cfg.fill_poll_interval_ms =
            env_parse("FILL_POLL_INTERVAL_MS").unwrap_or(cfg.fill_poll_interval_ms);
        cfg.fill_poll_timeout_ms =
            env_parse("FILL_POLL_TIMEOUT_MS").unwrap_or(cfg.fill_poll_timeout_ms);

        cfg.daily_loss_limit = std::env::var("DAILY_LOSS_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(cfg.daily_loss_limit);
        cfg.matching_similarity_threshold =
            env_parse("MATCHING_SIMILARITY_THRESHOLD").unwrap_or(cfg.matching_similarity_threshold);
        cfg.matching_confidence_threshold =
            env_parse("MATCHING_CONFIDENCE_THRESHOLD").unwrap_or(cfg.matching_confidence_threshold);

        cfg.api_key = std::env::var("API_KEY").ok();
        if cfg.api_key.is_none() && !is_development_chain(cfg.chain_id) {
            return Err(AgentError::config(
                "API_KEY is required when chainId does not identify a development network",
            ));
        }

        cfg.port = env_parse("PORT").unwrap_or(cfg.port);
        cfg.max_trades_per_session = env_parse("MAX_TRADES_PER_SESSION");
        cfg.predict_exchange_address =
            std::env::var("PREDICT_EXCHANGE_ADDRESS").unwrap_or(cfg.predict_exchange_address);

        Ok(cfg)
    }
}

fn is_development_chain(chain_id: u64) -> bool {
    matches!(chain_id, 31337 | 1337)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = Config::default();
        assert_eq!(cfg.min_spread_bps, 100);
        assert_eq!(cfg.scan_interval_ms, 5_000);
        assert_eq!(cfg.fill_poll_interval_ms, 5_000);
        assert_eq!(cfg.fill_poll_timeout_ms, 60_000);
        assert_eq!(cfg.daily_loss_limit, dec!(50));
        assert_eq!(cfg.max_position_size, dec!(500));
        assert_eq!(cfg.matching_similarity_threshold, 0.85);
    }

    #[test]
    fn development_chain_ids_recognized() {
        assert!(is_development_chain(31337));
        assert!(!is_development_chain(137));
    }
}
