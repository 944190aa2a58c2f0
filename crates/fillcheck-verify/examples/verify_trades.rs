//! # Trade Verification Example
//!
//! Verifies a small batch of reported trades against live market data.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example verify_trades
//! ```
//!
//! ## Prerequisites
//!
//! Set your Polygon API key (or use the demo key for testing):
//!
//! ```bash
//! export FILLCHECK_POLYGON_API_KEY=your_key_here
//! ```

use std::sync::Arc;

use fillcheck_core::{SymbolNormalizer, TradeSide, UtcDateTime};
use fillcheck_market::MarketDataGateway;
use fillcheck_verify::{TradeClaim, VerificationEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Default gateway: Polygon first, Yahoo as fallback.
    let engine = VerificationEngine::new(
        Arc::new(SymbolNormalizer::new()),
        Arc::new(MarketDataGateway::default()),
    );

    let claims = vec![
        TradeClaim::new(
            "journal-1",
            "EUR/USD",
            TradeSide::Long,
            1.0845,
            UtcDateTime::parse("2024-03-01T14:30:00Z")?,
            Some(1.0872),
            Some(UtcDateTime::parse("2024-03-01T16:05:00Z")?),
            None,
        )?,
        TradeClaim::new(
            "journal-2",
            "AAPL",
            TradeSide::Long,
            179.55,
            UtcDateTime::parse("2024-03-01T15:00:00Z")?,
            None,
            None,
            None,
        )?,
    ];

    println!("Verifying {} trades...", claims.len());
    let (checks, summary) = engine
        .verify_batch(
            &claims,
            Some(&|completed, total| println!("  progress: {completed}/{total}")),
        )
        .await;

    for check in &checks {
        println!(
            "{}: {} score={:.2} verified={} entry={:?}",
            check.trade_id, check.symbol, check.combined_score, check.verified, check.entry.status
        );
    }
    println!(
        "batch: {}/{} verified, mean score {:.2}",
        summary.verified, summary.total, summary.mean_score
    );

    Ok(())
}
