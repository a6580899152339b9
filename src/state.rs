//! Persisted agent state: a JSON snapshot written via atomic temp-file +
//! rename (never truncate the live file), with bigint-like decimal fields
//! round-tripped as decimal strings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::types::Position;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    pub trades_executed: u64,
    pub positions: Vec<Position>,
    pub last_scan: i64,
}

impl PersistedState {
    pub fn new() -> Self {
        Self {
            trades_executed: 0,
            positions: Vec::new(),
            last_scan: 0,
        }
    }

    /// Write to `path + ".tmp"`, then rename over `path`. The live file is
    /// never truncated in place.
    pub async fn save(&self, path: &Path) -> Result<(), AgentError> {
        let tmp_path = tmp_path_for(path);
        let serialized = serde_json::to_vec_pretty(self)
            .map_err(|e| AgentError::config(format!("failed to serialize state: {e}")))?;
        tokio::fs::write(&tmp_path, &serialized)
            .await
            .map_err(|e| AgentError::config(format!("failed to write temp state file: {e}")))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| AgentError::config(format!("failed to rename temp state file: {e}")))?;
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self, AgentError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AgentError::config(format!("failed to read state file: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AgentError::config(format!("failed to parse state file: {e}")))
    }

    pub async fn load_or_default(path: &Path) -> Self {
        match Self::load(path).await {
            Ok(state) => state,
            Err(_) => Self::new(),
        }
    }
}

impl Default for PersistedState {
    fn default() -> Self {
        Self::new()
    }
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    std::path::PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Fingerprint, Platform};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn round_trip_preserves_decimal_fields() {
        let dir = std::env::temp_dir().join(format!(
            "arb-agent-state-test-{}",
            std::process::id()
        ));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("state.json");

        let mut state = PersistedState::new();
        state.trades_executed = 3;
        state.last_scan = 1_700_000_000_000;
        state.positions.push(Position {
            position_id: "pos-1".into(),
            protocol_a: Platform::Predict,
            protocol_b: Platform::Probable,
            market_id: Fingerprint::new("abc123"),
            bought_yes_on_a: true,
            shares_a: dec!(1000.5),
            shares_b: dec!(1000.5),
            cost_a: dec!(550.25),
            cost_b: dec!(400.10),
            opened_at: Utc::now(),
            closed: false,
        });

        state.save(&path).await.unwrap();
        let loaded = PersistedState::load(&path).await.unwrap();
        assert_eq!(state, loaded);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_default() {
        let path = std::env::temp_dir().join("arb-agent-state-does-not-exist.json");
        let state = PersistedState::load_or_default(&path).await;
        assert_eq!(state.trades_executed, 0);
    }
}
