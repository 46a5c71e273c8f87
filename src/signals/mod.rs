// Signal evaluation across timeframes
// RSI and Kline families per signal timeframe, plus the trend filter,
// emergent daily exits and the range band rejection

pub mod bands;
pub mod emergent;
pub mod kline;
pub mod rsi;
pub mod trend;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregator::TimeframeHistory;
use crate::models::{Candle, Timeframe};
use crate::settings::EngineConfig;

pub use trend::{EmaTrendPhase, WeeklyTrend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    RsiEntry,
    KlineEntry,
    RsiReversalExit,
    RsiPeakExit,
    KlinePeakExit,
}

impl SignalKind {
    pub fn is_entry(&self) -> bool {
        matches!(self, SignalKind::RsiEntry | SignalKind::KlineEntry)
    }
}

/// A signal that fired, with the reason recorded in the audit trail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalHit {
    pub kind: SignalKind,
    pub reason: String,
}

impl SignalHit {
    pub fn new(kind: SignalKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Everything that fired on one timeframe this cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeframeSignals {
    pub hits: Vec<SignalHit>,
}

impl TimeframeSignals {
    pub fn fired(&self, kind: SignalKind) -> bool {
        self.hits.iter().any(|h| h.kind == kind)
    }

    /// RSI entry or Kline entry
    pub fn should_buy(&self) -> bool {
        self.fired(SignalKind::RsiEntry) || self.fired(SignalKind::KlineEntry)
    }

    pub fn entry_reasons(&self) -> Vec<String> {
        self.reasons(|k| k.is_entry())
    }

    pub fn exit_reasons(&self) -> Vec<String> {
        self.reasons(|k| !k.is_entry())
    }

    fn reasons(&self, keep: impl Fn(SignalKind) -> bool) -> Vec<String> {
        self.hits
            .iter()
            .filter(|h| keep(h.kind))
            .map(|h| h.reason.clone())
            .collect()
    }
}

/// Signal snapshot for one cycle.
///
/// Timeframes listed in `skipped` had too little closed history; they carry
/// no signals and no EMA phase, and cannot drive entries or promotions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalBook {
    /// Last 1h close
    pub price: f64,
    pub signals: BTreeMap<Timeframe, TimeframeSignals>,
    pub ema_phases: BTreeMap<Timeframe, EmaTrendPhase>,
    pub weekly_trend: WeeklyTrend,
    pub emergent: Vec<String>,
    pub band_rejections: BTreeMap<Timeframe, String>,
    /// Latest closed bar per timeframe, used to update the extrema trackers
    pub latest: BTreeMap<Timeframe, Candle>,
    pub skipped: Vec<Timeframe>,
}

impl SignalBook {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            ..Self::default()
        }
    }

    /// Run every evaluator over the closed history
    pub fn evaluate(history: &TimeframeHistory, config: &EngineConfig, price: f64) -> Self {
        let mut book = Self::new(price);

        for timeframe in Timeframe::SIGNAL {
            if let Some(latest) = history.latest(timeframe) {
                book.latest.insert(timeframe, latest.clone());
            }

            let bars = match history.require(timeframe, config.required_bars(timeframe)) {
                Ok(bars) => bars,
                Err(err) => {
                    tracing::warn!("⚠️  Skipping {} evaluators: {}", timeframe, err);
                    book.skipped.push(timeframe);
                    continue;
                }
            };

            let closes: Vec<f64> = bars.iter().map(|c| c.close).collect();

            let mut hits = rsi::evaluate(timeframe, &closes, config.rsi.for_timeframe(timeframe));
            hits.extend(kline::evaluate(timeframe, bars, &config.kline));
            book.signals.insert(timeframe, TimeframeSignals { hits });

            if timeframe != Timeframe::H1 {
                if let Some(phase) = trend::ema_phase(
                    &closes,
                    config.trend.promotion_fast,
                    config.trend.promotion_slow,
                    config.trend.near_pct,
                    config.trend.confirm_bars,
                ) {
                    book.ema_phases.insert(timeframe, phase);
                }
            }

            if let Some(reason) = bands::upper_band_rejection(bars, &config.range) {
                book.band_rejections.insert(timeframe, reason);
            }

            if timeframe == Timeframe::D1 {
                book.emergent = emergent::evaluate(bars, &config.emergent);
            }
        }

        match history.require(Timeframe::W1, config.required_bars(Timeframe::W1)) {
            Ok(weekly) => {
                let closes: Vec<f64> = weekly.iter().map(|c| c.close).collect();
                book.weekly_trend = trend::weekly_trend(&closes, config.trend.weekly_fast, config.trend.weekly_slow);
            }
            Err(err) => {
                tracing::warn!("⚠️  Weekly trend unavailable: {}", err);
                book.skipped.push(Timeframe::W1);
            }
        }

        tracing::debug!(
            "Signals: 1h={:?} 4h={:?} 1d={:?} weekly={} skipped={:?}",
            book.hit_count(Timeframe::H1),
            book.hit_count(Timeframe::H4),
            book.hit_count(Timeframe::D1),
            book.weekly_trend.as_str(),
            book.skipped
        );

        book
    }

    pub fn is_skipped(&self, timeframe: Timeframe) -> bool {
        self.skipped.contains(&timeframe)
    }

    pub fn timeframe(&self, timeframe: Timeframe) -> Option<&TimeframeSignals> {
        if self.is_skipped(timeframe) {
            return None;
        }
        self.signals.get(&timeframe)
    }

    pub fn should_buy(&self, timeframe: Timeframe) -> bool {
        self.timeframe(timeframe).is_some_and(TimeframeSignals::should_buy)
    }

    pub fn entry_reasons(&self, timeframe: Timeframe) -> Vec<String> {
        self.timeframe(timeframe)
            .map(TimeframeSignals::entry_reasons)
            .unwrap_or_default()
    }

    pub fn exit_reasons(&self, timeframe: Timeframe) -> Vec<String> {
        self.timeframe(timeframe)
            .map(TimeframeSignals::exit_reasons)
            .unwrap_or_default()
    }

    pub fn ema_phase(&self, timeframe: Timeframe) -> Option<EmaTrendPhase> {
        if self.is_skipped(timeframe) {
            return None;
        }
        self.ema_phases.get(&timeframe).copied()
    }

    pub fn band_rejection(&self, timeframe: Timeframe) -> Option<&str> {
        if self.is_skipped(timeframe) {
            return None;
        }
        self.band_rejections.get(&timeframe).map(String::as_str)
    }

    fn hit_count(&self, timeframe: Timeframe) -> Option<usize> {
        self.signals.get(&timeframe).map(|s| s.hits.len())
    }

    // Builders for assembling a book by hand

    pub fn with_hit(mut self, timeframe: Timeframe, kind: SignalKind, reason: impl Into<String>) -> Self {
        self.signals
            .entry(timeframe)
            .or_default()
            .hits
            .push(SignalHit::new(kind, reason));
        self
    }

    pub fn with_phase(mut self, timeframe: Timeframe, phase: EmaTrendPhase) -> Self {
        self.ema_phases.insert(timeframe, phase);
        self
    }

    pub fn with_weekly_trend(mut self, trend: WeeklyTrend) -> Self {
        self.weekly_trend = trend;
        self
    }

    pub fn with_emergent(mut self, reason: impl Into<String>) -> Self {
        self.emergent.push(reason.into());
        self
    }

    pub fn with_band_rejection(mut self, timeframe: Timeframe, reason: impl Into<String>) -> Self {
        self.band_rejections.insert(timeframe, reason.into());
        self
    }

    pub fn with_latest(mut self, candle: Candle) -> Self {
        self.latest.insert(candle.timeframe, candle);
        self
    }

    pub fn with_skipped(mut self, timeframe: Timeframe) -> Self {
        if !self.skipped.contains(&timeframe) {
            self.skipped.push(timeframe);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{aggregate, PendingAggregates};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_should_buy_needs_entry_kind() {
        let book = SignalBook::new(100.0)
            .with_hit(Timeframe::H4, SignalKind::RsiPeakExit, "SELL_RSI_PEAK_4H")
            .with_hit(Timeframe::H1, SignalKind::KlineEntry, "BUY_KLINE_ENTRY_1H");

        assert!(book.should_buy(Timeframe::H1));
        assert!(!book.should_buy(Timeframe::H4));
        assert_eq!(book.exit_reasons(Timeframe::H4), vec!["SELL_RSI_PEAK_4H".to_string()]);
    }

    #[test]
    fn test_skipped_timeframe_hides_signals() {
        let book = SignalBook::new(100.0)
            .with_hit(Timeframe::D1, SignalKind::RsiEntry, "BUY_RSI_ENTRY_1D")
            .with_phase(Timeframe::D1, EmaTrendPhase::Confirmed)
            .with_skipped(Timeframe::D1);

        assert!(!book.should_buy(Timeframe::D1));
        assert_eq!(book.ema_phase(Timeframe::D1), None);
    }

    #[test]
    fn test_short_history_skips_higher_timeframes() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 1, 0, 0).unwrap();
        let hourly: Vec<Candle> = (0..48)
            .map(|i| Candle {
                timeframe: Timeframe::H1,
                timestamp: start + Duration::hours(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + (i % 3) as f64,
                volume: 1.0,
            })
            .collect();

        let aggregation = aggregate(&hourly, PendingAggregates::default()).unwrap();
        let book = SignalBook::evaluate(&aggregation.history, &EngineConfig::default(), 102.0);

        assert!(!book.is_skipped(Timeframe::H1));
        assert_eq!(book.skipped, vec![Timeframe::H4, Timeframe::D1, Timeframe::W1]);
        assert_eq!(book.weekly_trend, WeeklyTrend::Unknown);
        // latest bars are tracked even for skipped timeframes
        assert!(book.latest.contains_key(&Timeframe::D1));
    }
}
