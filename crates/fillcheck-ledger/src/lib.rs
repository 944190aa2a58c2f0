//! FIFO position ledger for fillcheck.
//!
//! This crate contains:
//! - The pure FIFO matcher (`match_fifo`)
//! - The lot storage port and an in-memory implementation
//! - The stateful ledger with keyed per-position locking

pub mod error;
pub mod fifo;
pub mod ledger;
pub mod store;

pub use error::LedgerError;
pub use fifo::{match_fifo, FifoOutcome, LotClose};
pub use ledger::{EntryFill, EntryReceipt, ExitFill, ExitReport, PositionLedger};
pub use store::{InMemoryLotStore, LotStore};
