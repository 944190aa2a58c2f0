//! Pure FIFO matching.
//!
//! [`match_fifo`] takes the open lots for one owner+symbol and an exit fill
//! and returns the closed records, the surviving open lots, and any exit
//! quantity that had nothing left to match. No storage, no locking, no IO;
//! the ledger commits the outcome only after this function succeeds.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fillcheck_core::{realized_pnl_parts, Lot, UtcDateTime};

use crate::error::LedgerError;

/// Quantities within this distance of zero are treated as fully consumed,
/// so float residue from repeated partial closes cannot strand a lot.
const QTY_EPSILON: f64 = 1e-9;

/// One lot touched by an exit fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LotClose {
    /// Id of the closed record (the split-off record for a partial close).
    pub lot_id: Uuid,
    /// Id of the open lot the close came from.
    pub source_lot_id: Uuid,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub partial: bool,
}

/// Result of matching one exit fill against the open lots.
#[derive(Debug, Clone, PartialEq)]
pub struct FifoOutcome {
    /// Newly closed lot records, in FIFO order.
    pub closed: Vec<Lot>,
    /// Lots still open after the exit (reduced or untouched).
    pub remaining: Vec<Lot>,
    /// Per-lot close results, in FIFO order.
    pub closes: Vec<LotClose>,
    /// Exit quantity that exceeded total open exposure. Zero in the normal
    /// case; surfaced (never silently dropped) when the caller over-exits.
    pub unmatched_quantity: f64,
}

/// Match an exit fill against `open_lots` oldest-entry-first.
///
/// Fully consumed lots are closed in place; a partially consumed lot splits
/// off a closed record and stays open with reduced quantity. Realized PnL is
/// computed per closed quantity and written exactly once.
pub fn match_fifo(
    open_lots: Vec<Lot>,
    exit_price: f64,
    exit_time: UtcDateTime,
    exit_quantity: f64,
) -> Result<FifoOutcome, LedgerError> {
    let mut lots = open_lots;
    lots.sort_by(|a, b| {
        a.entry_time
            .cmp(&b.entry_time)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut closed = Vec::new();
    let mut remaining = Vec::new();
    let mut closes = Vec::new();
    let mut outstanding = exit_quantity;

    for mut lot in lots {
        if outstanding <= QTY_EPSILON {
            remaining.push(lot);
            continue;
        }

        if outstanding + QTY_EPSILON >= lot.quantity {
            // Full close.
            let breakdown = realized_pnl_parts(
                lot.side,
                lot.entry_price,
                exit_price,
                lot.quantity,
                lot.asset_class,
                lot.tick_size,
                lot.tick_value,
            )?;
            outstanding = (outstanding - lot.quantity).max(0.0);
            lot.close(exit_price, exit_time, breakdown.pnl, breakdown.pnl_pct)?;
            closes.push(LotClose {
                lot_id: lot.id,
                source_lot_id: lot.id,
                quantity: lot.quantity,
                pnl: breakdown.pnl,
                pnl_pct: breakdown.pnl_pct,
                partial: false,
            });
            closed.push(lot);
        } else {
            // Partial close: split off the closed quantity, keep the rest open.
            let breakdown = realized_pnl_parts(
                lot.side,
                lot.entry_price,
                exit_price,
                outstanding,
                lot.asset_class,
                lot.tick_size,
                lot.tick_value,
            )?;
            let split = lot.split_closed(
                outstanding,
                exit_price,
                exit_time,
                breakdown.pnl,
                breakdown.pnl_pct,
            )?;
            closes.push(LotClose {
                lot_id: split.id,
                source_lot_id: lot.id,
                quantity: split.quantity,
                pnl: breakdown.pnl,
                pnl_pct: breakdown.pnl_pct,
                partial: true,
            });
            closed.push(split);
            remaining.push(lot);
            outstanding = 0.0;
        }
    }

    Ok(FifoOutcome {
        closed,
        remaining,
        closes,
        unmatched_quantity: if outstanding <= QTY_EPSILON {
            0.0
        } else {
            outstanding
        },
    })
}
