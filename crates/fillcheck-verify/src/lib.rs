//! Trade authenticity verification for fillcheck.
//!
//! This crate contains:
//! - Leg scoring against historical OHLC ranges
//! - Trade-level aggregation and the verification bar
//! - Batch orchestration with grouped concurrency and progress reporting

pub mod engine;
pub mod result;

pub use engine::{ProgressFn, TradeClaim, VerificationEngine, VerifyConfig};
pub use result::{BatchSummary, LegCheck, LegKind, LegStatus, TradeCheck};
