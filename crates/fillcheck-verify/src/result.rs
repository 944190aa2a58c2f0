use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use fillcheck_core::{round_money, AssetClass, ProviderId, UtcDateTime};
use fillcheck_market::ProviderAttempt;

/// Which fill a leg verification covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Entry,
    Exit,
}

impl LegKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

impl Display for LegKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one leg's fill price against the market range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    Realistic,
    ImpossibleLow,
    ImpossibleHigh,
    SuspiciousPrecision,
    Unknown,
}

impl LegStatus {
    pub const fn is_impossible(self) -> bool {
        matches!(self, Self::ImpossibleLow | Self::ImpossibleHigh)
    }
}

/// Verification of one trade leg against historical market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegCheck {
    pub kind: LegKind,
    pub fill_price: f64,
    pub timestamp: UtcDateTime,
    pub market_low: Option<f64>,
    pub market_high: Option<f64>,
    pub market_open: Option<f64>,
    pub market_close: Option<f64>,
    /// Signed deviation of the fill from the range midpoint, as a fraction
    /// of the midpoint. `None` without market data.
    pub midpoint_deviation: Option<f64>,
    pub status: LegStatus,
    /// Authenticity confidence in `[0, 1]`.
    pub score: f64,
    pub note: String,
    /// Provider that supplied the range, when one did.
    pub provider: Option<ProviderId>,
}

/// Verification result for one reported trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCheck {
    pub trade_id: String,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub supported: bool,
    pub entry: LegCheck,
    pub exit: Option<LegCheck>,
    /// Mean of the leg scores.
    pub combined_score: f64,
    pub impossible_flag: bool,
    pub suspicious_flag: bool,
    pub verified: bool,
    /// Status of every provider consulted across the legs.
    pub attempts: Vec<ProviderAttempt>,
}

impl TradeCheck {
    pub fn legs(&self) -> impl Iterator<Item = &LegCheck> {
        std::iter::once(&self.entry).chain(self.exit.as_ref())
    }
}

/// Aggregate counts over one verification batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub verified: usize,
    pub impossible: usize,
    pub suspicious: usize,
    pub unknown: usize,
    /// Mean combined score across the batch, 2-decimal rounded; zero for an
    /// empty batch.
    pub mean_score: f64,
    /// Verified-trade counts keyed by the provider that supplied the entry
    /// leg's range.
    pub verified_by_provider: BTreeMap<ProviderId, usize>,
}

impl BatchSummary {
    pub fn from_checks(checks: &[TradeCheck]) -> Self {
        let total = checks.len();
        let verified = checks.iter().filter(|check| check.verified).count();
        let impossible = checks.iter().filter(|check| check.impossible_flag).count();
        let suspicious = checks.iter().filter(|check| check.suspicious_flag).count();
        let unknown = checks
            .iter()
            .filter(|check| check.legs().any(|leg| leg.status == LegStatus::Unknown))
            .count();

        let mean_score = if total == 0 {
            0.0
        } else {
            round_money(
                checks.iter().map(|check| check.combined_score).sum::<f64>() / total as f64,
            )
        };

        let mut verified_by_provider = BTreeMap::new();
        for check in checks.iter().filter(|check| check.verified) {
            if let Some(provider) = check.entry.provider {
                *verified_by_provider.entry(provider).or_insert(0) += 1;
            }
        }

        Self {
            total,
            verified,
            impossible,
            suspicious,
            unknown,
            mean_score,
            verified_by_provider,
        }
    }
}
