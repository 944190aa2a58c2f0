//! Realized profit-and-loss math.
//!
//! Pure functions: side, prices, quantity, and the instrument's pip/tick
//! metadata in, a rounded breakdown out. The ledger calls this exactly once
//! per lot close; nothing here mutates state.

use serde::{Deserialize, Serialize};

use crate::error::validate_positive;
use crate::{AssetClass, NormalizedSymbol, TradeSide, ValidationError};

/// Realized PnL for one closed quantity, with the asset-class breakdown when
/// the class is quoted in increments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnlBreakdown {
    /// Monetary PnL, rounded to 2 decimals.
    pub pnl: f64,
    /// PnL as a percentage of cost basis, rounded to 2 decimals. Zero when
    /// the cost basis is zero.
    pub pnl_pct: f64,
    /// Pip or tick count for increment-quoted classes.
    pub increments: Option<f64>,
    /// Quoted increment size used, when applicable.
    pub increment_size: Option<f64>,
    /// Account-currency value of one increment per unit of quantity.
    pub increment_value: Option<f64>,
}

/// Round to 2 decimal places, the monetary precision used everywhere.
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute realized PnL for a closed quantity of `symbol`.
///
/// Long positions profit when exit is above entry; short positions profit
/// when exit is below entry. Forex scales by pips, metals/indices/commodities
/// by ticks with a unit tick value, crypto and stocks by plain price
/// difference.
pub fn realized_pnl(
    side: TradeSide,
    entry_price: f64,
    exit_price: f64,
    quantity: f64,
    symbol: &NormalizedSymbol,
) -> Result<PnlBreakdown, ValidationError> {
    realized_pnl_parts(
        side,
        entry_price,
        exit_price,
        quantity,
        symbol.asset_class,
        symbol.tick_size,
        symbol.tick_value,
    )
}

/// Same computation from unpacked instrument metadata; the ledger calls this
/// with the pip/tick fields a lot was opened with.
pub fn realized_pnl_parts(
    side: TradeSide,
    entry_price: f64,
    exit_price: f64,
    quantity: f64,
    asset_class: AssetClass,
    tick_size: f64,
    tick_value: f64,
) -> Result<PnlBreakdown, ValidationError> {
    validate_positive("entry_price", entry_price)?;
    validate_positive("exit_price", exit_price)?;
    validate_positive("quantity", quantity)?;
    validate_positive("tick_size", tick_size)?;

    let price_diff = if side.is_long() {
        exit_price - entry_price
    } else {
        entry_price - exit_price
    };

    let (pnl, breakdown) = match asset_class {
        AssetClass::Forex => {
            let pips = price_diff / tick_size;
            let pnl = pips * quantity * tick_size;
            (pnl, Some((pips, tick_size, tick_value)))
        }
        AssetClass::Metal | AssetClass::Index | AssetClass::Commodity => {
            let ticks = price_diff / tick_size;
            let pnl = ticks * quantity * tick_value;
            (pnl, Some((ticks, tick_size, tick_value)))
        }
        AssetClass::Crypto | AssetClass::Stock | AssetClass::Unsupported => {
            (price_diff * quantity, None)
        }
    };

    let cost_basis = entry_price * quantity;
    let pnl_pct = if cost_basis > 0.0 {
        pnl / cost_basis * 100.0
    } else {
        0.0
    };

    Ok(PnlBreakdown {
        pnl: round_money(pnl),
        pnl_pct: round_money(pnl_pct),
        increments: breakdown.map(|(count, _, _)| round_money(count)),
        increment_size: breakdown.map(|(_, size, _)| size),
        increment_value: breakdown.map(|(_, _, value)| value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::classify;

    #[test]
    fn long_stock_gains_on_rise() {
        let symbol = classify("AAPL", None);
        let result =
            realized_pnl(TradeSide::Long, 100.0, 110.0, 10.0, &symbol).expect("valid input");
        assert_eq!(result.pnl, 100.00);
        assert_eq!(result.pnl_pct, 10.00);
        assert!(result.increments.is_none());
    }

    #[test]
    fn short_stock_loses_on_rise() {
        let symbol = classify("AAPL", None);
        let result =
            realized_pnl(TradeSide::Short, 100.0, 110.0, 10.0, &symbol).expect("valid input");
        assert_eq!(result.pnl, -100.00);
        assert_eq!(result.pnl_pct, -10.00);
    }

    #[test]
    fn forex_pip_pnl_matches_pip_count() {
        let symbol = classify("EURUSD", None);
        let result =
            realized_pnl(TradeSide::Long, 1.1000, 1.1050, 10_000.0, &symbol).expect("valid input");
        // 50 pips x 10,000 units x 0.0001.
        assert_eq!(result.pnl, 50.00);
        assert_eq!(result.increments, Some(50.00));
        assert_eq!(result.increment_size, Some(0.0001));
    }

    #[test]
    fn jpy_pair_scales_by_wide_pip() {
        let symbol = classify("USDJPY", None);
        let result =
            realized_pnl(TradeSide::Long, 150.00, 150.50, 1_000.0, &symbol).expect("valid input");
        assert_eq!(result.increments, Some(50.00));
        assert_eq!(result.pnl, 500.00);
    }

    #[test]
    fn gold_pnl_counts_ticks_at_unit_value() {
        let symbol = classify("XAUUSD", None);
        let result =
            realized_pnl(TradeSide::Long, 2000.0, 2001.0, 2.0, &symbol).expect("valid input");
        // 10 ticks of 0.1, unit tick value, 2 units.
        assert_eq!(result.increments, Some(10.00));
        assert_eq!(result.pnl, 20.00);
    }

    #[test]
    fn short_crypto_gains_on_drop() {
        let symbol = classify("BTCUSDT", None);
        let result =
            realized_pnl(TradeSide::Short, 50_000.0, 49_000.0, 0.5, &symbol).expect("valid input");
        assert_eq!(result.pnl, 500.00);
        assert_eq!(result.pnl_pct, 2.00);
    }

    #[test]
    fn rounding_is_two_decimals() {
        let symbol = classify("MSFT", None);
        let result =
            realized_pnl(TradeSide::Long, 3.0, 3.333333, 3.0, &symbol).expect("valid input");
        assert_eq!(result.pnl, 1.00);
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let symbol = classify("AAPL", None);
        let err = realized_pnl(TradeSide::Long, 100.0, 110.0, 0.0, &symbol)
            .expect_err("zero quantity must fail");
        assert!(matches!(err, ValidationError::NonPositiveValue { .. }));
    }
}
