//! Core data model shared across the discovery, matching, quoting, scanning,
//! and execution pipelines.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One of the three venues the agent trades across. Names are anonymized
/// labels rather than real venue identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Predict,
    Probable,
    Opinion,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Predict => write!(f, "Predict"),
            Platform::Probable => write!(f, "Probable"),
            Platform::Opinion => write!(f, "Opinion"),
        }
    }
}

/// A 32-byte hex-string identifier agreed upon per matched set of markets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().to_lowercase())
    }

    /// Build a fingerprint from a numeric Opinion market id, per the C5
    /// precedence rule (Opinion-only matches fall back to the numeric id
    /// cast to hex).
    pub fn from_opinion_id(id: i64) -> Self {
        Self(format!("{id:064x}"))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Venue-independent shape produced by C5 discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredMarket {
    pub id: String,
    pub platform: Platform,
    pub title: String,
    pub condition_id: Option<String>,
    pub category: Option<String>,
    pub resolves_at: Option<i64>,
    pub yes_token_id: String,
    pub no_token_id: String,
    pub outcome_labels: [String; 2],
    pub image: Option<String>,
    pub url: Option<String>,
}

/// The subset of `DiscoveredMarket` the matching engine (C4) consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketInput {
    pub id: String,
    pub title: String,
    pub condition_id: Option<String>,
    pub category: Option<String>,
    pub resolves_at: Option<i64>,
}

impl From<&DiscoveredMarket> for MarketInput {
    fn from(m: &DiscoveredMarket) -> Self {
        Self {
            id: m.id.clone(),
            title: m.title.clone(),
            condition_id: m.condition_id.clone(),
            category: m.category.clone(),
            resolves_at: m.resolves_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    ConditionId,
    TemplateMatch,
    TitleSimilarity,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::ConditionId => write!(f, "conditionId"),
            MatchType::TemplateMatch => write!(f, "templateMatch"),
            MatchType::TitleSimilarity => write!(f, "titleSimilarity"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub market_a: MarketInput,
    pub market_b: MarketInput,
    pub match_type: MatchType,
    pub similarity: f64,
    pub polarity_flip: bool,
}

/// Fixed-point price/liquidity quote for a single fingerprint on a single
/// venue. Prices are 18-decimal fractions of one payout unit; liquidities
/// are USDT with 6 decimal places. Both live entirely in `Decimal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketQuote {
    pub market_id: Fingerprint,
    pub protocol: Platform,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    pub yes_liquidity: Decimal,
    pub no_liquidity: Decimal,
    pub fee_bps: u32,
    pub quoted_at: DateTime<Utc>,
    pub title: Option<String>,
    pub outcome_labels: Option<[String; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitOpportunity {
    pub market_id: Fingerprint,
    pub protocol_a: Platform,
    pub protocol_b: Platform,
    pub buy_yes_on_a: bool,
    pub yes_price_a: Decimal,
    pub no_price_b: Decimal,
    pub total_cost: Decimal,
    pub guaranteed_payout: Decimal,
    pub spread_bps: i64,
    pub gross_spread_bps: i64,
    pub fees_deducted: Decimal,
    pub est_profit: Decimal,
    pub liquidity_a: Decimal,
    pub liquidity_b: Decimal,
    pub polarity_flip: bool,
    pub quoted_at: DateTime<Utc>,
    pub shares: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Venue-normalized order lifecycle status, the target of each client's
/// per-venue synonym table (see `clients::OrderStatus` mapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Filled,
    Open,
    Partial,
    Cancelled,
    Expired,
    Unknown,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Open => write!(f, "OPEN"),
            OrderStatus::Partial => write!(f, "PARTIAL"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Expired => write!(f, "EXPIRED"),
            OrderStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Ledger entry of a completed (or partially completed) two-leg open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub position_id: String,
    pub protocol_a: Platform,
    pub protocol_b: Platform,
    pub market_id: Fingerprint,
    pub bought_yes_on_a: bool,
    pub shares_a: Decimal,
    pub shares_b: Decimal,
    pub cost_a: Decimal,
    pub cost_b: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed: bool,
}
