//! Cross-venue binary prediction-market arbitrage agent.
//!
//! Discovers the same market listed on multiple venues, aggregates live
//! quotes for each side, scans for guaranteed-payout spreads that clear
//! the configured thresholds after fees, and executes the winning
//! opportunity as a sequential two-leg trade. See `agent::Agent` for the
//! tick loop that ties discovery, quoting, scanning, and execution
//! together.

pub mod agent;
pub mod clients;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod matching;
pub mod metrics;
pub mod normalize;
pub mod polarity;
pub mod quotes;
pub mod retry;
pub mod scanner;
pub mod similarity;
pub mod state;
pub mod template;
pub mod types;

pub use agent::Agent;
pub use config::Config;
pub use error::AgentError;
pub use executor::Executor;
pub use metrics::Metrics;
pub use state::PersistedState;
pub use types::{ArbitOpportunity, DiscoveredMarket, Fingerprint, MarketQuote, Platform, Position};
