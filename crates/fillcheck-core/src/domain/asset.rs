use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical asset class of a normalized instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Forex,
    Crypto,
    Stock,
    Metal,
    Index,
    Commodity,
    Unsupported,
}

impl AssetClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forex => "forex",
            Self::Crypto => "crypto",
            Self::Stock => "stock",
            Self::Metal => "metal",
            Self::Index => "index",
            Self::Commodity => "commodity",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether PnL for this class is quoted in pips/ticks rather than
    /// plain price difference.
    pub const fn uses_increments(self) -> bool {
        matches!(self, Self::Forex | Self::Metal | Self::Index | Self::Commodity)
    }
}

impl Display for AssetClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    pub const fn is_long(self) -> bool {
        matches!(self, Self::Long)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl Display for TradeSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeSide {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Ingest payloads use buy/sell as often as long/short.
        match value.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Ok(Self::Long),
            "short" | "sell" => Ok(Self::Short),
            other => Err(ValidationError::InvalidSide {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_aliases_parse() {
        assert_eq!("BUY".parse::<TradeSide>().expect("must parse"), TradeSide::Long);
        assert_eq!("sell".parse::<TradeSide>().expect("must parse"), TradeSide::Short);
        assert_eq!("short".parse::<TradeSide>().expect("must parse"), TradeSide::Short);
    }

    #[test]
    fn unknown_side_is_rejected() {
        let err = "hold".parse::<TradeSide>().expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidSide { .. }));
    }

    #[test]
    fn increment_classes() {
        assert!(AssetClass::Forex.uses_increments());
        assert!(AssetClass::Metal.uses_increments());
        assert!(!AssetClass::Crypto.uses_increments());
        assert!(!AssetClass::Stock.uses_increments());
    }
}
