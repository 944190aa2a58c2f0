//! Lot persistence port.
//!
//! The spec of this engine fixes entities and invariants, not a storage
//! technology; the ledger talks to this trait and ships with an in-memory
//! implementation. A database-backed store implements the same surface.

use std::collections::HashMap;
use std::sync::Mutex;

use fillcheck_core::Lot;

/// Storage contract for lots, scoped by owner and symbol identity.
///
/// `commit_exit` replaces the open set and appends the newly closed records
/// in one call so a storage backend can make the swap atomic.
pub trait LotStore: Send + Sync {
    fn insert_lot(&self, lot: Lot);

    /// Open lots for one owner+symbol, unordered; the matcher sorts.
    fn open_lots(&self, owner: &str, symbol: &str) -> Vec<Lot>;

    /// Replace the open lots for owner+symbol with `remaining_open` and
    /// append `closed`.
    fn commit_exit(&self, owner: &str, symbol: &str, remaining_open: Vec<Lot>, closed: Vec<Lot>);

    /// Every lot (open and closed) for an owner, across symbols.
    fn lots_for_owner(&self, owner: &str) -> Vec<Lot>;

    fn open_quantity(&self, owner: &str, symbol: &str) -> f64 {
        self.open_lots(owner, symbol)
            .iter()
            .map(|lot| lot.quantity)
            .sum()
    }
}

/// Process-local store backed by a hash map.
#[derive(Debug, Default)]
pub struct InMemoryLotStore {
    lots: Mutex<HashMap<(String, String), Vec<Lot>>>,
}

impl InMemoryLotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LotStore for InMemoryLotStore {
    fn insert_lot(&self, lot: Lot) {
        let key = (lot.owner.clone(), lot.symbol.clone());
        let mut lots = self
            .lots
            .lock()
            .expect("lot store lock should not be poisoned");
        lots.entry(key).or_default().push(lot);
    }

    fn open_lots(&self, owner: &str, symbol: &str) -> Vec<Lot> {
        let lots = self
            .lots
            .lock()
            .expect("lot store lock should not be poisoned");
        lots.get(&(owner.to_owned(), symbol.to_owned()))
            .map(|entry| entry.iter().filter(|lot| lot.is_open).cloned().collect())
            .unwrap_or_default()
    }

    fn commit_exit(&self, owner: &str, symbol: &str, remaining_open: Vec<Lot>, closed: Vec<Lot>) {
        let mut lots = self
            .lots
            .lock()
            .expect("lot store lock should not be poisoned");
        let entry = lots
            .entry((owner.to_owned(), symbol.to_owned()))
            .or_default();

        let mut rebuilt: Vec<Lot> = entry.iter().filter(|lot| !lot.is_open).cloned().collect();
        rebuilt.extend(closed);
        rebuilt.extend(remaining_open);
        *entry = rebuilt;
    }

    fn lots_for_owner(&self, owner: &str) -> Vec<Lot> {
        let lots = self
            .lots
            .lock()
            .expect("lot store lock should not be poisoned");
        lots.iter()
            .filter(|((lot_owner, _), _)| lot_owner.as_str() == owner)
            .flat_map(|(_, entry)| entry.iter().cloned())
            .collect()
    }
}
