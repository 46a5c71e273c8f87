use crate::indicators::calculate_rsi_series;
use crate::models::Timeframe;
use crate::settings::{ReversalStyle, RsiTimeframeConfig};

use super::{SignalHit, SignalKind};

/// RSI entry and exit signals on the latest closed bar of one timeframe
pub fn evaluate(timeframe: Timeframe, closes: &[f64], params: &RsiTimeframeConfig) -> Vec<SignalHit> {
    let series = calculate_rsi_series(closes, params.period);
    if series.len() < 2 {
        return Vec::new();
    }

    let current = series[series.len() - 1];
    let previous = series[series.len() - 2];
    let mut hits = Vec::new();

    tracing::debug!("{} RSI: {:.1} -> {:.1}", timeframe, previous, current);

    // Oversold recovery
    if previous < params.oversold && current >= params.oversold {
        hits.push(SignalHit::new(
            SignalKind::RsiEntry,
            format!(
                "BUY_RSI_ENTRY_{}: RSI {:.1} -> {:.1} recovered above {:.0}",
                timeframe.label(),
                previous,
                current,
                params.oversold
            ),
        ));
    }

    if params.reversal.enabled && params.reversal.lookback > 0 {
        let start = series.len().saturating_sub(params.reversal.lookback);
        let max = series[start..].iter().cloned().fold(f64::MIN, f64::max);

        if max >= params.reversal.high && current <= max - params.reversal.drop {
            let code = match params.reversal.style {
                ReversalStyle::Spike => format!("SELL_RSI_{}_SPIKE", timeframe.label()),
                ReversalStyle::PreWave => format!("SELL_RSI_{}_SPIKE_PRE_WAVE", timeframe.label()),
            };
            hits.push(SignalHit::new(
                SignalKind::RsiReversalExit,
                format!("{}: RSI max {:.1} -> {:.1}", code, max, current),
            ));
        }
    }

    if params.peak.enabled && previous >= params.peak.overbought && current < params.peak.overbought {
        hits.push(SignalHit::new(
            SignalKind::RsiPeakExit,
            format!(
                "SELL_RSI_PEAK_{}: RSI {:.1} -> {:.1} fell below {:.0}",
                timeframe.label(),
                previous,
                current,
                params.peak.overbought
            ),
        ));
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RsiConfig;

    fn kinds(hits: &[SignalHit]) -> Vec<SignalKind> {
        hits.iter().map(|h| h.kind).collect()
    }

    #[test]
    fn test_oversold_recovery_fires_entry() {
        // 14 straight losses (RSI 0) then a strong bounce
        let mut closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        closes.push(95.0);

        let hits = evaluate(Timeframe::H1, &closes, &RsiConfig::default().h1);

        assert_eq!(kinds(&hits), vec![SignalKind::RsiEntry]);
        assert!(hits[0].reason.starts_with("BUY_RSI_ENTRY_1H"));
    }

    #[test]
    fn test_spike_reversal_label_per_style() {
        // Steady rise (RSI 100) followed by a sharp drop
        let mut closes: Vec<f64> = (0..16).map(|i| 100.0 + i as f64).collect();
        closes.push(105.0);

        let h4 = evaluate(Timeframe::H4, &closes, &RsiConfig::default().h4);
        assert!(h4.iter().any(|h| h.reason.starts_with("SELL_RSI_4H_SPIKE:")));

        let d1 = evaluate(Timeframe::D1, &closes, &RsiConfig::default().d1);
        assert!(d1.iter().any(|h| h.reason.starts_with("SELL_RSI_1D_SPIKE_PRE_WAVE")));
    }

    #[test]
    fn test_peak_exit_respects_enable_flag() {
        let mut closes: Vec<f64> = (0..16).map(|i| 100.0 + i as f64).collect();
        closes.push(105.0);

        let config = RsiConfig::default();
        let h1 = evaluate(Timeframe::H1, &closes, &config.h1);
        let h4 = evaluate(Timeframe::H4, &closes, &config.h4);

        assert!(!kinds(&h1).contains(&SignalKind::RsiPeakExit));
        assert!(kinds(&h4).contains(&SignalKind::RsiPeakExit));
    }

    #[test]
    fn test_flat_series_has_no_signals() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 2) as f64).collect();
        assert!(evaluate(Timeframe::H1, &closes, &RsiConfig::default().h1).is_empty());
    }

    #[test]
    fn test_insufficient_data() {
        assert!(evaluate(Timeframe::H1, &[100.0; 10], &RsiConfig::default().h1).is_empty());
    }
}
