//! Error taxonomy for the agent core. Every failure that crosses a component
//! boundary is classified into one of these variants; no raw library error
//! (reqwest, serde_json, ...) is allowed to propagate across the core
//! boundary unclassified.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing or malformed configuration. Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Timeout, 5xx, or network reset. Retried with backoff inside the
    /// client call layer (see `retry::with_retry`).
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// 401 after a refresh attempt. Marks the venue degraded for the
    /// remainder of the tick.
    #[error("auth error: {0}")]
    Auth(String),

    /// 4xx with a structured reason (e.g. per-market collateral limit).
    /// Non-retryable; surfaced as the failure of that one order.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// `quotedAt` is beyond the freshness window. The opportunity is
    /// skipped silently by the scanner.
    #[error("stale quote for {market_id}")]
    StaleQuote { market_id: String },

    /// First leg filled partially and the second leg was aborted.
    #[error("partial fill: leg1 cost {leg1_cost}, leg2 never placed")]
    PartialFill { leg1_cost: String },

    /// Server rejected the order due to a stale nonce.
    #[error("nonce conflict on {venue}")]
    NonceConflict { venue: String },
}

impl AgentError {
    pub fn config(msg: impl Into<String>) -> Self {
        AgentError::Config(msg.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        AgentError::Validation {
            reason: reason.into(),
        }
    }

    /// Per §7: only TransientNetwork, Auth (once, to allow a single refresh
    /// retry upstream), and NonceConflict are ever retried automatically;
    /// everything else is a terminal classification for that operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::TransientNetwork(_) | AgentError::NonceConflict { .. }
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            AgentError::Config(m) => format!("configuration error: {m}"),
            AgentError::TransientNetwork(m) => format!("transient network error: {m}"),
            AgentError::Auth(m) => format!("authentication failed: {m}"),
            AgentError::Validation { reason } => format!("validation failed: {reason}"),
            AgentError::StaleQuote { market_id } => {
                format!("quote for {market_id} is stale, skipping")
            }
            AgentError::PartialFill { leg1_cost } => {
                format!("partial fill recorded, leg1 cost {leg1_cost}")
            }
            AgentError::NonceConflict { venue } => format!("nonce conflict on {venue}"),
        }
    }

    /// Classify a `reqwest::Error` into the taxonomy. HTTP status codes are
    /// classified separately by each client via `from_status`, since the
    /// mapping from status+body to variant is venue-specific.
    pub fn from_network_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::TransientNetwork("request timed out".to_string())
        } else if err.is_connect() {
            AgentError::TransientNetwork("connection failed".to_string())
        } else {
            AgentError::TransientNetwork(err.to_string())
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => AgentError::Auth(body.to_string()),
            429 => AgentError::TransientNetwork(format!("rate limited: {body}")),
            500..=599 => AgentError::TransientNetwork(format!("server error {status}: {body}")),
            400..=499 => AgentError::validation(format!("http {status}: {body}")),
            _ => AgentError::validation(format!("unexpected status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_nonce_are_retryable() {
        assert!(AgentError::TransientNetwork("x".into()).is_retryable());
        assert!(AgentError::NonceConflict {
            venue: "Predict".into()
        }
        .is_retryable());
    }

    #[test]
    fn validation_and_auth_are_not_retryable() {
        assert!(!AgentError::validation("bad").is_retryable());
        assert!(!AgentError::Auth("nope".into()).is_retryable());
        assert!(!AgentError::StaleQuote {
            market_id: "abc".into()
        }
        .is_retryable());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            AgentError::from_status(401, ""),
            AgentError::Auth(_)
        ));
        assert!(matches!(
            AgentError::from_status(503, ""),
            AgentError::TransientNetwork(_)
        ));
        assert!(matches!(
            AgentError::from_status(400, "collateral limit"),
            AgentError::Validation { .. }
        ));
    }
}
