//! Stateful position ledger.
//!
//! Entries open lots; exits consume them oldest-first through the pure
//! matcher. All mutation for one owner+symbol runs under a keyed lock, the
//! engine's primary correctness-critical concurrency boundary: two exits
//! racing on the same open lots would otherwise double-count closures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use fillcheck_core::{
    round_money, AssetClass, InstrumentHint, Lot, SymbolNormalizer, TradeSide, UtcDateTime,
    ValidationError,
};

use crate::error::LedgerError;
use crate::fifo::{match_fifo, LotClose};
use crate::store::LotStore;

/// Entry fill event from an ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFill {
    pub owner: String,
    pub symbol: String,
    pub side: TradeSide,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: UtcDateTime,
    pub hint: Option<InstrumentHint>,
}

impl EntryFill {
    pub fn new(
        owner: impl Into<String>,
        symbol: impl Into<String>,
        side: TradeSide,
        price: f64,
        quantity: f64,
        timestamp: UtcDateTime,
        hint: Option<InstrumentHint>,
    ) -> Result<Self, LedgerError> {
        let owner = owner.into();
        let symbol = symbol.into();
        validate_fill_fields(&owner, &symbol, price, quantity)?;
        Ok(Self {
            owner,
            symbol,
            side,
            price,
            quantity,
            timestamp,
            hint,
        })
    }
}

/// Exit fill event. Side is implied by the open lots it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitFill {
    pub owner: String,
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: UtcDateTime,
    pub hint: Option<InstrumentHint>,
}

impl ExitFill {
    pub fn new(
        owner: impl Into<String>,
        symbol: impl Into<String>,
        price: f64,
        quantity: f64,
        timestamp: UtcDateTime,
        hint: Option<InstrumentHint>,
    ) -> Result<Self, LedgerError> {
        let owner = owner.into();
        let symbol = symbol.into();
        validate_fill_fields(&owner, &symbol, price, quantity)?;
        Ok(Self {
            owner,
            symbol,
            price,
            quantity,
            timestamp,
            hint,
        })
    }
}

fn validate_fill_fields(
    owner: &str,
    symbol: &str,
    price: f64,
    quantity: f64,
) -> Result<(), LedgerError> {
    if owner.trim().is_empty() {
        return Err(ValidationError::EmptyOwner.into());
    }
    if symbol.trim().is_empty() {
        return Err(ValidationError::EmptySymbol.into());
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(ValidationError::NonPositiveValue {
            field: "price",
            value: price,
        }
        .into());
    }
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(ValidationError::NonPositiveValue {
            field: "quantity",
            value: quantity,
        }
        .into());
    }
    Ok(())
}

/// What an entry ingestion returns: the new lot plus the asset-class
/// metadata the normalizer resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryReceipt {
    pub lot_id: Uuid,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub tick_size: f64,
    pub tick_value: f64,
}

/// What an exit ingestion returns: per-lot results plus aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitReport {
    pub closes: Vec<LotClose>,
    /// Sum of per-lot PnL, 2-decimal rounded.
    pub total_pnl: f64,
    /// Mean of per-lot PnL percentages (not re-derived from aggregate
    /// prices), 2-decimal rounded.
    pub mean_pnl_pct: f64,
    /// Exit quantity that exceeded total open exposure, when any.
    pub unmatched_quantity: Option<f64>,
}

/// Keyed async locks, one per (owner, symbol).
#[derive(Default)]
struct KeyedLocks {
    inner: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    fn for_key(&self, owner: &str, symbol: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .inner
            .lock()
            .expect("keyed lock table should not be poisoned");
        locks
            .entry((owner.to_owned(), symbol.to_owned()))
            .or_default()
            .clone()
    }
}

/// FIFO position ledger over a lot store.
pub struct PositionLedger {
    store: Arc<dyn LotStore>,
    normalizer: Arc<SymbolNormalizer>,
    locks: KeyedLocks,
}

impl PositionLedger {
    pub fn new(store: Arc<dyn LotStore>, normalizer: Arc<SymbolNormalizer>) -> Self {
        Self {
            store,
            normalizer,
            locks: KeyedLocks::default(),
        }
    }

    /// Ingest an entry fill: always opens a new lot. Multiple open lots per
    /// owner+symbol are expected (position scaling).
    pub async fn ingest_entry(&self, fill: EntryFill) -> Result<EntryReceipt, LedgerError> {
        let normalized = self.normalizer.normalize(&fill.symbol, fill.hint);
        let identity = normalized.identity.clone();

        let lock = self.locks.for_key(&fill.owner, &identity);
        let _guard = lock.lock().await;

        let lot = Lot::open(
            fill.owner.clone(),
            identity.clone(),
            fill.side,
            fill.quantity,
            fill.price,
            fill.timestamp,
            normalized.asset_class,
            normalized.tick_size,
            normalized.tick_value,
        )?;
        let receipt = EntryReceipt {
            lot_id: lot.id,
            symbol: identity,
            asset_class: normalized.asset_class,
            tick_size: normalized.tick_size,
            tick_value: normalized.tick_value,
        };
        self.store.insert_lot(lot);

        info!(
            owner = %fill.owner,
            symbol = %receipt.symbol,
            side = %fill.side,
            quantity = fill.quantity,
            "opened lot"
        );
        Ok(receipt)
    }

    /// Ingest an exit fill: FIFO-close open lots, oldest entry first.
    pub async fn ingest_exit(&self, fill: ExitFill) -> Result<ExitReport, LedgerError> {
        let normalized = self.normalizer.normalize(&fill.symbol, fill.hint);
        let identity = normalized.identity.clone();

        let lock = self.locks.for_key(&fill.owner, &identity);
        let _guard = lock.lock().await;

        let open = self.store.open_lots(&fill.owner, &identity);
        if open.is_empty() {
            return Err(LedgerError::NoOpenPosition {
                owner: fill.owner,
                symbol: identity,
            });
        }

        let outcome = match_fifo(open, fill.price, fill.timestamp, fill.quantity)?;
        self.store
            .commit_exit(&fill.owner, &identity, outcome.remaining, outcome.closed);

        let total_pnl = round_money(outcome.closes.iter().map(|close| close.pnl).sum());
        let mean_pnl_pct = if outcome.closes.is_empty() {
            0.0
        } else {
            round_money(
                outcome.closes.iter().map(|close| close.pnl_pct).sum::<f64>()
                    / outcome.closes.len() as f64,
            )
        };

        if outcome.unmatched_quantity > 0.0 {
            warn!(
                owner = %fill.owner,
                symbol = %identity,
                unmatched = outcome.unmatched_quantity,
                "exit quantity exceeded open exposure; remainder not matched"
            );
        }

        info!(
            owner = %fill.owner,
            symbol = %identity,
            lots_touched = outcome.closes.len(),
            total_pnl,
            "matched exit"
        );

        Ok(ExitReport {
            closes: outcome.closes,
            total_pnl,
            mean_pnl_pct,
            unmatched_quantity: (outcome.unmatched_quantity > 0.0)
                .then_some(outcome.unmatched_quantity),
        })
    }

    /// Net open quantity for owner+symbol; never negative.
    pub fn open_exposure(&self, owner: &str, symbol: &str, hint: Option<InstrumentHint>) -> f64 {
        let normalized = self.normalizer.normalize(symbol, hint);
        self.store.open_quantity(owner, &normalized.identity)
    }

    /// All lots recorded for an owner, open and closed.
    pub fn lots_for_owner(&self, owner: &str) -> Vec<Lot> {
        self.store.lots_for_owner(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLotStore;

    fn ts(input: &str) -> UtcDateTime {
        UtcDateTime::parse(input).expect("valid timestamp")
    }

    fn ledger() -> PositionLedger {
        PositionLedger::new(
            Arc::new(InMemoryLotStore::new()),
            Arc::new(SymbolNormalizer::new()),
        )
    }

    fn entry(symbol: &str, price: f64, quantity: f64, at: &str) -> EntryFill {
        EntryFill::new("owner-1", symbol, TradeSide::Long, price, quantity, ts(at), None)
            .expect("valid entry")
    }

    fn exit(symbol: &str, price: f64, quantity: f64, at: &str) -> ExitFill {
        ExitFill::new("owner-1", symbol, price, quantity, ts(at), None).expect("valid exit")
    }

    #[tokio::test]
    async fn entry_reports_asset_metadata() {
        let ledger = ledger();
        let receipt = ledger
            .ingest_entry(entry("EUR/USD", 1.1000, 10_000.0, "2024-03-01T10:00:00Z"))
            .await
            .expect("entry succeeds");

        assert_eq!(receipt.symbol, "EURUSD");
        assert_eq!(receipt.asset_class, AssetClass::Forex);
        assert_eq!(receipt.tick_size, 0.0001);
        assert_eq!(ledger.open_exposure("owner-1", "EURUSD", None), 10_000.0);
    }

    #[tokio::test]
    async fn exit_without_position_fails() {
        let ledger = ledger();
        let err = ledger
            .ingest_exit(exit("AAPL", 110.0, 10.0, "2024-03-01T10:00:00Z"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, LedgerError::NoOpenPosition { .. }));
        assert_eq!(err.code(), "ledger.no_open_position");
    }

    #[tokio::test]
    async fn symbol_spellings_share_one_position() {
        let ledger = ledger();
        ledger
            .ingest_entry(entry("EUR/USD", 1.1000, 10_000.0, "2024-03-01T10:00:00Z"))
            .await
            .expect("entry succeeds");

        // Same identity, different raw spelling.
        let report = ledger
            .ingest_exit(exit("EURUSD", 1.1050, 10_000.0, "2024-03-01T11:00:00Z"))
            .await
            .expect("exit succeeds");

        assert_eq!(report.closes.len(), 1);
        assert_eq!(report.total_pnl, 50.00);
        assert_eq!(ledger.open_exposure("owner-1", "EURUSD", None), 0.0);
    }

    #[tokio::test]
    async fn scaling_in_and_partial_exit() {
        let ledger = ledger();
        ledger
            .ingest_entry(entry("AAPL", 100.0, 10.0, "2024-03-01T10:00:00Z"))
            .await
            .expect("entry succeeds");
        ledger
            .ingest_entry(entry("AAPL", 105.0, 10.0, "2024-03-01T11:00:00Z"))
            .await
            .expect("entry succeeds");

        let report = ledger
            .ingest_exit(exit("AAPL", 110.0, 15.0, "2024-03-01T12:00:00Z"))
            .await
            .expect("exit succeeds");

        assert_eq!(report.closes.len(), 2);
        assert_eq!(report.total_pnl, 125.00);
        // 10% on the first lot, ~4.76% on the second; mean of per-lot pcts.
        assert_eq!(report.mean_pnl_pct, round_money((10.0 + 25.0 / (105.0 * 5.0) * 100.0) / 2.0));
        assert_eq!(report.unmatched_quantity, None);
        assert_eq!(ledger.open_exposure("owner-1", "AAPL", None), 5.0);
    }

    #[tokio::test]
    async fn over_exit_surfaces_unmatched_quantity() {
        let ledger = ledger();
        ledger
            .ingest_entry(entry("AAPL", 100.0, 10.0, "2024-03-01T10:00:00Z"))
            .await
            .expect("entry succeeds");

        let report = ledger
            .ingest_exit(exit("AAPL", 110.0, 14.0, "2024-03-01T12:00:00Z"))
            .await
            .expect("exit succeeds");

        assert_eq!(report.closes.len(), 1);
        assert_eq!(report.unmatched_quantity, Some(4.0));
        assert_eq!(ledger.open_exposure("owner-1", "AAPL", None), 0.0);

        // The remainder is reported, not matched: a second exit now fails.
        let err = ledger
            .ingest_exit(exit("AAPL", 110.0, 1.0, "2024-03-01T13:00:00Z"))
            .await
            .expect_err("nothing left to match");
        assert!(matches!(err, LedgerError::NoOpenPosition { .. }));
    }

    #[tokio::test]
    async fn invalid_fill_fails_fast() {
        let err = EntryFill::new(
            "owner-1",
            "AAPL",
            TradeSide::Long,
            -1.0,
            10.0,
            ts("2024-03-01T10:00:00Z"),
            None,
        )
        .expect_err("negative price must fail");
        assert_eq!(err.code(), "ledger.invalid_request");
    }

    #[tokio::test]
    async fn concurrent_exits_never_double_close() {
        let ledger = Arc::new(ledger());
        ledger
            .ingest_entry(entry("AAPL", 100.0, 10.0, "2024-03-01T10:00:00Z"))
            .await
            .expect("entry succeeds");

        let a = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .ingest_exit(exit("AAPL", 110.0, 10.0, "2024-03-01T12:00:00Z"))
                    .await
            })
        };
        let b = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .ingest_exit(exit("AAPL", 110.0, 10.0, "2024-03-01T12:00:00Z"))
                    .await
            })
        };

        let first = a.await.expect("task completes");
        let second = b.await.expect("task completes");

        // Exactly one of the racing exits wins; the loser sees no position.
        let successes = [&first, &second]
            .iter()
            .filter(|result| result.is_ok())
            .count();
        assert_eq!(successes, 1);

        let closed_quantity: f64 = ledger
            .lots_for_owner("owner-1")
            .iter()
            .filter(|lot| !lot.is_open)
            .map(|lot| lot.quantity)
            .sum();
        assert_eq!(closed_quantity, 10.0);
    }
}
