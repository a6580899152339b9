//! C6 — Venue Quote Providers: per-venue order-book fetch + price/depth
//! synthesis into `MarketQuote`.

pub mod opinion;
pub mod predict;
pub mod probable;
pub mod store;

pub use opinion::OpinionQuoteProvider;
pub use predict::PredictQuoteProvider;
pub use probable::ProbableQuoteProvider;
pub use store::QuoteStore;

/// Slippage window, in bps from the touch, used when summing book depth.
pub const SLIPPAGE_WINDOW_BPS: i64 = 200;

/// Each provider exposes `async fn fetch_quotes(&self) -> Result<Vec<MarketQuote>, AgentError>`
/// directly (not via a `dyn`-safe trait, matching the teacher's concrete
/// `impl` style in `scanner.rs`/`services/mint_maker/scanner.rs` — there is
/// never more than one concrete provider type live per venue, so static
/// dispatch at the discovery/agent call sites is sufficient).
