use crate::models::{Candle, Timeframe};
use crate::settings::KlineConfig;

use super::{SignalHit, SignalKind};

/// Candlestick reversal patterns on the latest closed bar.
///
/// The `lookback` bars before the latest one give the swing high/low and
/// decide whether the market was advancing or declining into it.
pub fn evaluate(timeframe: Timeframe, bars: &[Candle], config: &KlineConfig) -> Vec<SignalHit> {
    let lookback = config.lookback.max(1);
    if bars.len() < lookback + 1 {
        return Vec::new();
    }

    let latest = &bars[bars.len() - 1];
    let prior = &bars[bars.len() - 1 - lookback..bars.len() - 1];
    let mut hits = Vec::new();

    let entry: Vec<&str> = [
        bullish_engulfing(latest, prior, config).then_some("bullish engulfing"),
        hammer(latest, prior, config).then_some("hammer"),
        failed_breakdown(latest, prior).then_some("failed breakdown"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !entry.is_empty() {
        hits.push(SignalHit::new(
            SignalKind::KlineEntry,
            format!("BUY_KLINE_ENTRY_{}: {}", timeframe.label(), entry.join(" + ")),
        ));
    }

    let exit: Vec<&str> = [
        bearish_engulfing(latest, prior, config).then_some("bearish engulfing"),
        shooting_star(latest, prior, config).then_some("shooting star"),
        failed_breakout(latest, prior).then_some("failed breakout"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !exit.is_empty() {
        hits.push(SignalHit::new(
            SignalKind::KlinePeakExit,
            format!("SELL_KLINE_PEAK_{}: {}", timeframe.label(), exit.join(" + ")),
        ));
    }

    hits
}

fn previous(prior: &[Candle]) -> Option<&Candle> {
    prior.last()
}

fn declining(prior: &[Candle]) -> bool {
    match (prior.first(), prior.last()) {
        (Some(first), Some(last)) => last.close < first.open,
        _ => false,
    }
}

fn advancing(prior: &[Candle]) -> bool {
    match (prior.first(), prior.last()) {
        (Some(first), Some(last)) => last.close > first.open,
        _ => false,
    }
}

fn bullish_engulfing(latest: &Candle, prior: &[Candle], config: &KlineConfig) -> bool {
    let Some(prev) = previous(prior) else {
        return false;
    };

    prev.is_bearish()
        && latest.is_bullish()
        && latest.open <= prev.close
        && latest.close >= prev.open
        && latest.range() > 0.0
        && latest.body() >= config.min_body_share * latest.range()
}

fn bearish_engulfing(latest: &Candle, prior: &[Candle], config: &KlineConfig) -> bool {
    let Some(prev) = previous(prior) else {
        return false;
    };

    prev.is_bullish()
        && latest.is_bearish()
        && latest.open >= prev.close
        && latest.close <= prev.open
        && latest.range() > 0.0
        && latest.body() >= config.min_body_share * latest.range()
}

fn hammer(latest: &Candle, prior: &[Candle], config: &KlineConfig) -> bool {
    let range = latest.range();

    range > 0.0
        && declining(prior)
        && latest.lower_wick() >= config.wick_share * range
        && latest.upper_wick() <= config.opposite_wick_max_share * range
}

fn shooting_star(latest: &Candle, prior: &[Candle], config: &KlineConfig) -> bool {
    let range = latest.range();

    range > 0.0
        && advancing(prior)
        && latest.upper_wick() >= config.wick_share * range
        && latest.lower_wick() <= config.opposite_wick_max_share * range
}

/// Undercut of the prior swing low that closes back above it
fn failed_breakdown(latest: &Candle, prior: &[Candle]) -> bool {
    let swing_low = prior.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    latest.low < swing_low && latest.close > swing_low
}

/// Poke above the prior swing high that closes back below it
fn failed_breakout(latest: &Candle, prior: &[Candle]) -> bool {
    let swing_high = prior.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    latest.high > swing_high && latest.close < swing_high
}
