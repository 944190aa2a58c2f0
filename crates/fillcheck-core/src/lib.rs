//! Core contracts for fillcheck.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - Provider identifiers
//! - Symbol normalization and asset classification
//! - Realized PnL math

pub mod domain;
pub mod error;
pub mod normalize;
pub mod pnl;
pub mod provider;

pub use domain::{AssetClass, Bar, BarSeries, Lot, TradeSide, UtcDateTime};
pub use error::{CoreError, ValidationError};
pub use normalize::{classify, InstrumentHint, NormalizedSymbol, SymbolNormalizer, UNIT_TICK_VALUE};
pub use pnl::{realized_pnl, realized_pnl_parts, round_money, PnlBreakdown};
pub use provider::ProviderId;
