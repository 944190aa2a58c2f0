//! Authenticity verification.
//!
//! A leg is scored against the OHLC range of the minute containing its
//! timestamp: outside the tolerated range is impossible, a fill pinned to
//! the bar's extreme is suspicious, anything else scores by distance from
//! the range midpoint. Trades aggregate their legs; batches run in small
//! groups to respect provider quotas.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fillcheck_core::{
    round_money, AssetClass, InstrumentHint, NormalizedSymbol, SymbolNormalizer, TradeSide,
    UtcDateTime, ValidationError,
};
use fillcheck_market::{MarketDataGateway, ProviderAttempt, RangeLookup};

use crate::result::{BatchSummary, LegCheck, LegKind, LegStatus, TradeCheck};

/// A reported trade to verify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeClaim {
    pub id: String,
    pub symbol: String,
    pub side: TradeSide,
    pub entry_price: f64,
    pub entry_time: UtcDateTime,
    pub exit_price: Option<f64>,
    pub exit_time: Option<UtcDateTime>,
    pub hint: Option<InstrumentHint>,
}

impl TradeClaim {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        side: TradeSide,
        entry_price: f64,
        entry_time: UtcDateTime,
        exit_price: Option<f64>,
        exit_time: Option<UtcDateTime>,
        hint: Option<InstrumentHint>,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyTradeId);
        }
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(ValidationError::NonPositiveValue {
                field: "entry_price",
                value: entry_price,
            });
        }
        if exit_price.is_some() != exit_time.is_some() {
            return Err(ValidationError::ExitFieldsIncomplete);
        }
        if let Some(price) = exit_price {
            if !price.is_finite() || price <= 0.0 {
                return Err(ValidationError::NonPositiveValue {
                    field: "exit_price",
                    value: price,
                });
            }
        }

        Ok(Self {
            id,
            symbol: symbol.into(),
            side,
            entry_price,
            entry_time,
            exit_price,
            exit_time,
            hint,
        })
    }
}

/// Batch pacing and the verification bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyConfig {
    /// Trades verified concurrently per group.
    pub group_size: usize,
    /// Pause between groups, for provider quota headroom.
    pub group_delay: Duration,
    /// Minimum combined score for `verified = true`.
    pub verify_threshold: f64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            group_size: 5,
            group_delay: Duration::from_millis(300),
            verify_threshold: 0.7,
        }
    }
}

/// Progress callback: `(completed, total)` after each group.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Verification engine over the market data gateway.
pub struct VerificationEngine {
    normalizer: Arc<SymbolNormalizer>,
    gateway: Arc<MarketDataGateway>,
    config: VerifyConfig,
}

impl VerificationEngine {
    pub fn new(normalizer: Arc<SymbolNormalizer>, gateway: Arc<MarketDataGateway>) -> Self {
        Self {
            normalizer,
            gateway,
            config: VerifyConfig::default(),
        }
    }

    pub fn with_config(mut self, config: VerifyConfig) -> Self {
        self.config = config;
        self
    }

    /// Verify one trade. Never fails: missing data and unsupported symbols
    /// degrade to `Unknown` legs rather than errors.
    pub async fn verify_trade(&self, claim: &TradeClaim) -> TradeCheck {
        let normalized = self.normalizer.normalize(&claim.symbol, claim.hint);

        if !normalized.supported {
            let note = normalized
                .rejection
                .clone()
                .unwrap_or_else(|| String::from("unsupported symbol"));
            let entry = unknown_leg(LegKind::Entry, claim.entry_price, claim.entry_time, &note);
            let exit = claim.exit_price.zip(claim.exit_time).map(|(price, time)| {
                unknown_leg(LegKind::Exit, price, time, &note)
            });
            return assemble_check(
                claim,
                &normalized,
                entry,
                exit,
                Vec::new(),
                self.config.verify_threshold,
            );
        }

        let exit_fill = claim.exit_price.zip(claim.exit_time);

        // Both legs of one trade fetch concurrently, except when they land
        // in the same minute bucket: then the exit must reuse the entry's
        // cache entry instead of racing it to the provider.
        let (entry_lookup, exit_scored) = match exit_fill {
            Some((price, time)) if time.minute_bucket() == claim.entry_time.minute_bucket() => {
                let entry_lookup = self.gateway.range_at(&normalized, claim.entry_time).await;
                let exit_lookup = self.gateway.range_at(&normalized, time).await;
                let leg = score_leg(LegKind::Exit, price, time, &exit_lookup, &normalized);
                (entry_lookup, Some((leg, exit_lookup.attempts)))
            }
            Some((price, time)) => {
                let (entry_lookup, exit_lookup) = tokio::join!(
                    self.gateway.range_at(&normalized, claim.entry_time),
                    self.gateway.range_at(&normalized, time)
                );
                let leg = score_leg(LegKind::Exit, price, time, &exit_lookup, &normalized);
                (entry_lookup, Some((leg, exit_lookup.attempts)))
            }
            None => (
                self.gateway.range_at(&normalized, claim.entry_time).await,
                None,
            ),
        };

        let mut attempts = entry_lookup.attempts.clone();
        let entry = score_leg(
            LegKind::Entry,
            claim.entry_price,
            claim.entry_time,
            &entry_lookup,
            &normalized,
        );

        let exit = exit_scored.map(|(leg, exit_attempts)| {
            attempts.extend(exit_attempts);
            leg
        });

        let check = assemble_check(
            claim,
            &normalized,
            entry,
            exit,
            attempts,
            self.config.verify_threshold,
        );
        debug!(
            trade = %check.trade_id,
            symbol = %check.symbol,
            score = check.combined_score,
            verified = check.verified,
            "verified trade"
        );
        check
    }

    /// Verify a batch in fixed-size groups with an inter-group delay.
    ///
    /// `progress` is invoked after every group with `(completed, total)`;
    /// `completed` is strictly increasing and reaches the batch size exactly
    /// once.
    pub async fn verify_batch(
        &self,
        claims: &[TradeClaim],
        progress: Option<ProgressFn<'_>>,
    ) -> (Vec<TradeCheck>, BatchSummary) {
        let total = claims.len();
        let group_size = self.config.group_size.max(1);
        let mut checks = Vec::with_capacity(total);

        let group_count = claims.chunks(group_size).count();
        for (index, group) in claims.chunks(group_size).enumerate() {
            let group_checks = join_all(group.iter().map(|claim| self.verify_trade(claim))).await;
            checks.extend(group_checks);

            if let Some(report) = progress {
                report(checks.len(), total);
            }

            if index + 1 < group_count {
                tokio::time::sleep(self.config.group_delay).await;
            }
        }

        let summary = BatchSummary::from_checks(&checks);
        info!(
            total = summary.total,
            verified = summary.verified,
            impossible = summary.impossible,
            mean_score = summary.mean_score,
            "verification batch complete"
        );
        (checks, summary)
    }
}

fn unknown_leg(kind: LegKind, fill_price: f64, timestamp: UtcDateTime, note: &str) -> LegCheck {
    LegCheck {
        kind,
        fill_price,
        timestamp,
        market_low: None,
        market_high: None,
        market_open: None,
        market_close: None,
        midpoint_deviation: None,
        status: LegStatus::Unknown,
        score: 0.5,
        note: note.to_owned(),
        provider: None,
    }
}

/// Price tolerance applied around the bar range before a fill counts as
/// impossible: 2 pips for forex, 0.1% of the fill for crypto, 0.05% else.
fn tolerance_for(symbol: &NormalizedSymbol, fill_price: f64) -> f64 {
    match symbol.asset_class {
        AssetClass::Forex => 2.0 * symbol.tick_size,
        AssetClass::Crypto => fill_price * 0.001,
        _ => fill_price * 0.000_5,
    }
}

/// Score one leg against a range lookup.
pub(crate) fn score_leg(
    kind: LegKind,
    fill_price: f64,
    timestamp: UtcDateTime,
    lookup: &RangeLookup,
    symbol: &NormalizedSymbol,
) -> LegCheck {
    let Some(range) = lookup.range else {
        return unknown_leg(kind, fill_price, timestamp, "no market data");
    };

    let midpoint = range.midpoint();
    let deviation = if midpoint > 0.0 {
        Some((fill_price - midpoint) / midpoint)
    } else {
        None
    };
    let tolerance = tolerance_for(symbol, fill_price);

    let (status, score, note) = if fill_price < range.low - tolerance {
        (
            LegStatus::ImpossibleLow,
            0.0,
            format!(
                "fill {fill_price} is below the market low {} beyond tolerance",
                range.low
            ),
        )
    } else if fill_price > range.high + tolerance {
        (
            LegStatus::ImpossibleHigh,
            0.0,
            format!(
                "fill {fill_price} is above the market high {} beyond tolerance",
                range.high
            ),
        )
    } else if (fill_price - range.low).abs() <= tolerance * 0.1
        || (fill_price - range.high).abs() <= tolerance * 0.1
    {
        (
            LegStatus::SuspiciousPrecision,
            0.3,
            String::from("fill sits exactly on the bar extreme"),
        )
    } else {
        let deviation_pct = deviation.map(|d| d.abs() * 100.0).unwrap_or(f64::MAX);
        let score = if deviation_pct < 0.1 {
            1.0
        } else if deviation_pct < 0.5 {
            0.9
        } else if deviation_pct < 1.0 {
            0.75
        } else {
            0.6
        };
        (
            LegStatus::Realistic,
            score,
            format!("fill within market range ({deviation_pct:.3}% from midpoint)"),
        )
    };

    LegCheck {
        kind,
        fill_price,
        timestamp,
        market_low: Some(range.low),
        market_high: Some(range.high),
        market_open: Some(range.open),
        market_close: Some(range.close),
        midpoint_deviation: deviation,
        status,
        score,
        note,
        provider: lookup.provider,
    }
}

/// Aggregate legs into the trade-level verdict.
pub(crate) fn assemble_check(
    claim: &TradeClaim,
    symbol: &NormalizedSymbol,
    entry: LegCheck,
    exit: Option<LegCheck>,
    attempts: Vec<ProviderAttempt>,
    verify_threshold: f64,
) -> TradeCheck {
    let leg_count = 1 + usize::from(exit.is_some());
    let score_sum = entry.score + exit.as_ref().map(|leg| leg.score).unwrap_or(0.0);
    let combined_score = round_money(score_sum / leg_count as f64);

    let impossible_flag = entry.status.is_impossible()
        || exit.as_ref().is_some_and(|leg| leg.status.is_impossible());
    let suspicious_flag = entry.status == LegStatus::SuspiciousPrecision
        || exit
            .as_ref()
            .is_some_and(|leg| leg.status == LegStatus::SuspiciousPrecision);
    let any_unknown = entry.status == LegStatus::Unknown
        || exit.as_ref().is_some_and(|leg| leg.status == LegStatus::Unknown);

    let verified = symbol.supported
        && !impossible_flag
        && !any_unknown
        && combined_score >= verify_threshold;

    TradeCheck {
        trade_id: claim.id.clone(),
        symbol: symbol.identity.clone(),
        asset_class: symbol.asset_class,
        supported: symbol.supported,
        entry,
        exit,
        combined_score,
        impossible_flag,
        suspicious_flag,
        verified,
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fillcheck_core::{classify, Bar, ProviderId};
    use fillcheck_market::{AttemptStatus, MarketRange};

    fn ts(input: &str) -> UtcDateTime {
        UtcDateTime::parse(input).expect("valid timestamp")
    }

    fn lookup_with_range(low: f64, high: f64) -> RangeLookup {
        let bar = Bar::new(ts("2024-03-01T14:30:00Z"), (low + high) / 2.0, high, low, (low + high) / 2.0, None)
            .expect("valid bar");
        RangeLookup {
            range: Some(MarketRange::from_bar(&bar)),
            provider: Some(ProviderId::Polygon),
            attempts: vec![ProviderAttempt::new(ProviderId::Polygon, AttemptStatus::Success)],
        }
    }

    fn claim(entry_price: f64, exit_price: Option<f64>) -> TradeClaim {
        TradeClaim::new(
            "trade-1",
            "EURUSD",
            TradeSide::Long,
            entry_price,
            ts("2024-03-01T14:30:00Z"),
            exit_price,
            exit_price.map(|_| ts("2024-03-01T15:30:00Z")),
            None,
        )
        .expect("valid claim")
    }

    #[test]
    fn fill_near_midpoint_scores_full_confidence() {
        let symbol = classify("EURUSD", None);
        let lookup = lookup_with_range(1.0990, 1.1010);
        let leg = score_leg(LegKind::Entry, 1.1000, ts("2024-03-01T14:30:00Z"), &lookup, &symbol);

        assert_eq!(leg.status, LegStatus::Realistic);
        assert_eq!(leg.score, 1.0);
        assert_eq!(leg.provider, Some(ProviderId::Polygon));
    }

    #[test]
    fn fill_below_tolerated_low_is_impossible() {
        let symbol = classify("EURUSD", None);
        let lookup = lookup_with_range(1.0990, 1.1010);
        // Two pips of forex tolerance: anything below 1.0988 is impossible.
        let leg = score_leg(LegKind::Entry, 1.0980, ts("2024-03-01T14:30:00Z"), &lookup, &symbol);

        assert_eq!(leg.status, LegStatus::ImpossibleLow);
        assert_eq!(leg.score, 0.0);
    }

    #[test]
    fn fill_pinned_to_the_low_is_suspicious_not_impossible() {
        let symbol = classify("EURUSD", None);
        let lookup = lookup_with_range(1.0990, 1.1010);
        let leg = score_leg(LegKind::Entry, 1.0990, ts("2024-03-01T14:30:00Z"), &lookup, &symbol);

        assert_eq!(leg.status, LegStatus::SuspiciousPrecision);
        assert_eq!(leg.score, 0.3);
    }

    #[test]
    fn missing_range_is_unknown_with_neutral_score() {
        let symbol = classify("EURUSD", None);
        let lookup = RangeLookup {
            range: None,
            provider: None,
            attempts: vec![],
        };
        let leg = score_leg(LegKind::Entry, 1.1000, ts("2024-03-01T14:30:00Z"), &lookup, &symbol);

        assert_eq!(leg.status, LegStatus::Unknown);
        assert_eq!(leg.score, 0.5);
        assert_eq!(leg.note, "no market data");
    }

    #[test]
    fn deviation_tiers_map_to_scores() {
        let symbol = classify("AAPL", None);
        // Wide bar so nothing trips the precision band.
        let lookup = lookup_with_range(90.0, 110.0);
        let at = ts("2024-03-01T14:30:00Z");

        // Midpoint 100: 0.3% off -> 0.9, 0.8% -> 0.75, 2% -> 0.6.
        assert_eq!(score_leg(LegKind::Entry, 100.3, at, &lookup, &symbol).score, 0.9);
        assert_eq!(score_leg(LegKind::Entry, 100.8, at, &lookup, &symbol).score, 0.75);
        assert_eq!(score_leg(LegKind::Entry, 102.0, at, &lookup, &symbol).score, 0.6);
    }

    #[test]
    fn combined_score_threshold_governs_verified() {
        let symbol = classify("EURUSD", None);
        let at = ts("2024-03-01T14:30:00Z");
        let realistic = |score: f64| LegCheck {
            kind: LegKind::Entry,
            fill_price: 1.1,
            timestamp: at,
            market_low: Some(1.0),
            market_high: Some(1.2),
            market_open: Some(1.1),
            market_close: Some(1.1),
            midpoint_deviation: Some(0.0),
            status: LegStatus::Realistic,
            score,
            note: String::new(),
            provider: Some(ProviderId::Polygon),
        };

        let passing = assemble_check(
            &claim(1.1, Some(1.2)),
            &symbol,
            realistic(0.84),
            Some(realistic(0.6)),
            vec![],
            0.7,
        );
        assert_eq!(passing.combined_score, 0.72);
        assert!(passing.verified);

        let failing = assemble_check(
            &claim(1.1, Some(1.2)),
            &symbol,
            realistic(0.78),
            Some(realistic(0.6)),
            vec![],
            0.7,
        );
        assert_eq!(failing.combined_score, 0.69);
        assert!(!failing.verified);
    }

    #[test]
    fn impossible_leg_forces_unverified_regardless_of_other_leg() {
        let symbol = classify("EURUSD", None);
        let at = ts("2024-03-01T14:30:00Z");
        let perfect = LegCheck {
            kind: LegKind::Entry,
            fill_price: 1.1,
            timestamp: at,
            market_low: Some(1.0),
            market_high: Some(1.2),
            market_open: Some(1.1),
            market_close: Some(1.1),
            midpoint_deviation: Some(0.0),
            status: LegStatus::Realistic,
            score: 1.0,
            note: String::new(),
            provider: Some(ProviderId::Polygon),
        };
        let impossible = LegCheck {
            status: LegStatus::ImpossibleLow,
            score: 0.0,
            kind: LegKind::Exit,
            ..perfect.clone()
        };

        let check = assemble_check(
            &claim(1.1, Some(1.2)),
            &symbol,
            perfect,
            Some(impossible),
            vec![],
            0.7,
        );
        assert!(check.impossible_flag);
        assert!(!check.verified);
        assert_eq!(check.combined_score, 0.5);
    }

    #[test]
    fn claim_validation_rejects_half_an_exit() {
        let err = TradeClaim::new(
            "trade-1",
            "EURUSD",
            TradeSide::Long,
            1.1,
            ts("2024-03-01T14:30:00Z"),
            Some(1.2),
            None,
            None,
        )
        .expect_err("exit price without timestamp must fail");
        assert!(matches!(err, ValidationError::ExitFieldsIncomplete));
    }
}
