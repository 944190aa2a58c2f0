//! Behavior tests for the FIFO position ledger.
//!
//! These cover the spec-level accounting scenarios: FIFO consumption order,
//! quantity conservation across exits, and the PnL reference values for each
//! asset class.

use fillcheck_core::TradeSide;
use fillcheck_ledger::{EntryFill, ExitFill, LedgerError};
use fillcheck_tests::{fresh_ledger, ts};

fn entry(symbol: &str, side: TradeSide, price: f64, quantity: f64, at: &str) -> EntryFill {
    EntryFill::new("trader-1", symbol, side, price, quantity, ts(at), None).expect("valid entry")
}

fn exit(symbol: &str, price: f64, quantity: f64, at: &str) -> ExitFill {
    ExitFill::new("trader-1", symbol, price, quantity, ts(at), None).expect("valid exit")
}

#[tokio::test]
async fn earliest_entry_is_consumed_first() {
    let ledger = fresh_ledger();

    let first = ledger
        .ingest_entry(entry("AAPL", TradeSide::Long, 100.0, 10.0, "2024-03-01T10:00:00Z"))
        .await
        .expect("entry succeeds");
    let second = ledger
        .ingest_entry(entry("AAPL", TradeSide::Long, 101.0, 10.0, "2024-03-01T10:05:00Z"))
        .await
        .expect("entry succeeds");

    let report = ledger
        .ingest_exit(exit("AAPL", 105.0, 5.0, "2024-03-01T11:00:00Z"))
        .await
        .expect("exit succeeds");

    assert_eq!(report.closes.len(), 1);
    assert_eq!(report.closes[0].source_lot_id, first.lot_id);
    assert_ne!(report.closes[0].source_lot_id, second.lot_id);
    assert!(report.closes[0].partial);
}

#[tokio::test]
async fn quantity_is_conserved_after_any_exit() {
    let ledger = fresh_ledger();
    for (price, quantity, at) in [
        (100.0, 3.0, "2024-03-01T10:00:00Z"),
        (101.0, 7.0, "2024-03-01T10:10:00Z"),
        (102.0, 5.0, "2024-03-01T10:20:00Z"),
    ] {
        ledger
            .ingest_entry(entry("MSFT", TradeSide::Long, price, quantity, at))
            .await
            .expect("entry succeeds");
    }

    let before = ledger.open_exposure("trader-1", "MSFT", None);
    assert_eq!(before, 15.0);

    ledger
        .ingest_exit(exit("MSFT", 103.0, 8.0, "2024-03-01T11:00:00Z"))
        .await
        .expect("exit succeeds");

    let open_after = ledger.open_exposure("trader-1", "MSFT", None);
    let closed_after: f64 = ledger
        .lots_for_owner("trader-1")
        .iter()
        .filter(|lot| !lot.is_open)
        .map(|lot| lot.quantity)
        .sum();

    assert!((open_after + closed_after - before).abs() < 1e-9);
    assert!((closed_after - 8.0).abs() < 1e-9);
}

#[tokio::test]
async fn stock_pnl_reference_values() {
    let ledger = fresh_ledger();
    ledger
        .ingest_entry(entry("AAPL", TradeSide::Long, 100.0, 10.0, "2024-03-01T10:00:00Z"))
        .await
        .expect("entry succeeds");
    let long_report = ledger
        .ingest_exit(exit("AAPL", 110.0, 10.0, "2024-03-01T11:00:00Z"))
        .await
        .expect("exit succeeds");
    assert_eq!(long_report.total_pnl, 100.00);
    assert_eq!(long_report.mean_pnl_pct, 10.00);

    ledger
        .ingest_entry(entry("TSLA", TradeSide::Short, 100.0, 10.0, "2024-03-01T10:00:00Z"))
        .await
        .expect("entry succeeds");
    let short_report = ledger
        .ingest_exit(exit("TSLA", 110.0, 10.0, "2024-03-01T11:00:00Z"))
        .await
        .expect("exit succeeds");
    assert_eq!(short_report.total_pnl, -100.00);
}

#[tokio::test]
async fn forex_pip_pnl_reference_value() {
    let ledger = fresh_ledger();
    ledger
        .ingest_entry(entry("EURUSD", TradeSide::Long, 1.1000, 10_000.0, "2024-03-01T10:00:00Z"))
        .await
        .expect("entry succeeds");

    let report = ledger
        .ingest_exit(exit("EURUSD", 1.1050, 10_000.0, "2024-03-01T11:00:00Z"))
        .await
        .expect("exit succeeds");

    // 50 pips x 10,000 units x 0.0001.
    assert_eq!(report.total_pnl, 50.00);
}

#[tokio::test]
async fn closed_lot_pnl_is_never_rewritten() {
    let ledger = fresh_ledger();
    ledger
        .ingest_entry(entry("AAPL", TradeSide::Long, 100.0, 10.0, "2024-03-01T10:00:00Z"))
        .await
        .expect("entry succeeds");

    ledger
        .ingest_exit(exit("AAPL", 110.0, 4.0, "2024-03-01T11:00:00Z"))
        .await
        .expect("exit succeeds");
    let first_snapshot: Vec<_> = ledger
        .lots_for_owner("trader-1")
        .into_iter()
        .filter(|lot| !lot.is_open)
        .collect();
    assert_eq!(first_snapshot.len(), 1);
    assert_eq!(first_snapshot[0].realized_pnl, Some(40.00));

    // A later exit at a different price must not touch the earlier record.
    ledger
        .ingest_exit(exit("AAPL", 90.0, 6.0, "2024-03-01T12:00:00Z"))
        .await
        .expect("exit succeeds");
    let closed: Vec<_> = ledger
        .lots_for_owner("trader-1")
        .into_iter()
        .filter(|lot| !lot.is_open)
        .collect();
    assert_eq!(closed.len(), 2);
    let earlier = closed
        .iter()
        .find(|lot| lot.id == first_snapshot[0].id)
        .expect("earlier record still present");
    assert_eq!(earlier.realized_pnl, Some(40.00));
}

#[tokio::test]
async fn positions_are_isolated_per_owner() {
    let ledger = fresh_ledger();
    ledger
        .ingest_entry(
            EntryFill::new(
                "trader-1",
                "AAPL",
                TradeSide::Long,
                100.0,
                10.0,
                ts("2024-03-01T10:00:00Z"),
                None,
            )
            .expect("valid entry"),
        )
        .await
        .expect("entry succeeds");

    let err = ledger
        .ingest_exit(
            ExitFill::new(
                "trader-2",
                "AAPL",
                110.0,
                10.0,
                ts("2024-03-01T11:00:00Z"),
                None,
            )
            .expect("valid exit"),
        )
        .await
        .expect_err("other owner has no position");
    assert!(matches!(err, LedgerError::NoOpenPosition { .. }));
}
