use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::validate_positive;
use crate::{AssetClass, TradeSide, UtcDateTime, ValidationError};

/// One accounting unit of a position: a single entry fill, possibly split
/// later by partial exits.
///
/// A lot is either open (no exit fields) or closed. Closed lots are never
/// mutated again; the realized PnL fields are written exactly once, at the
/// moment the lot closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: Uuid,
    pub owner: String,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: UtcDateTime,
    pub asset_class: AssetClass,
    pub tick_size: f64,
    pub tick_value: f64,
    pub is_open: bool,
    pub exit_price: Option<f64>,
    pub exit_time: Option<UtcDateTime>,
    pub realized_pnl: Option<f64>,
    pub realized_pnl_pct: Option<f64>,
}

impl Lot {
    /// Create a new open lot from an entry fill.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        owner: impl Into<String>,
        symbol: impl Into<String>,
        side: TradeSide,
        quantity: f64,
        entry_price: f64,
        entry_time: UtcDateTime,
        asset_class: AssetClass,
        tick_size: f64,
        tick_value: f64,
    ) -> Result<Self, ValidationError> {
        let owner = owner.into();
        if owner.trim().is_empty() {
            return Err(ValidationError::EmptyOwner);
        }
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        validate_positive("quantity", quantity)?;
        validate_positive("entry_price", entry_price)?;
        validate_positive("tick_size", tick_size)?;
        validate_positive("tick_value", tick_value)?;

        Ok(Self {
            id: Uuid::new_v4(),
            owner,
            symbol,
            side,
            quantity,
            entry_price,
            entry_time,
            asset_class,
            tick_size,
            tick_value,
            is_open: true,
            exit_price: None,
            exit_time: None,
            realized_pnl: None,
            realized_pnl_pct: None,
        })
    }

    /// Close the whole lot. Exit fields and realized PnL are written here and
    /// never rewritten.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: UtcDateTime,
        realized_pnl: f64,
        realized_pnl_pct: f64,
    ) -> Result<(), ValidationError> {
        if !self.is_open {
            return Err(ValidationError::LotAlreadyClosed);
        }
        validate_positive("exit_price", exit_price)?;
        if exit_time < self.entry_time {
            return Err(ValidationError::ExitBeforeEntry);
        }

        self.is_open = false;
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);
        self.realized_pnl = Some(realized_pnl);
        self.realized_pnl_pct = Some(realized_pnl_pct);
        Ok(())
    }

    /// Partially close the lot: split off a new closed lot of `quantity` and
    /// shrink this one in place. This lot stays open.
    pub fn split_closed(
        &mut self,
        quantity: f64,
        exit_price: f64,
        exit_time: UtcDateTime,
        realized_pnl: f64,
        realized_pnl_pct: f64,
    ) -> Result<Lot, ValidationError> {
        if !self.is_open {
            return Err(ValidationError::LotAlreadyClosed);
        }
        validate_positive("quantity", quantity)?;
        if quantity >= self.quantity {
            return Err(ValidationError::ReduceExceedsQuantity {
                requested: quantity,
                available: self.quantity,
            });
        }

        let mut closed = Lot {
            id: Uuid::new_v4(),
            quantity,
            ..self.clone()
        };
        closed.close(exit_price, exit_time, realized_pnl, realized_pnl_pct)?;

        self.quantity -= quantity;
        Ok(closed)
    }
}
