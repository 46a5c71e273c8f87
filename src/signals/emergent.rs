// Emergent daily exits, evaluated regardless of the management timeframe
use crate::models::Candle;
use crate::settings::EmergentConfig;

use super::trend::aligned_emas;

/// Both emergent exits over closed daily bars, as reason strings
pub fn evaluate(daily: &[Candle], config: &EmergentConfig) -> Vec<String> {
    [vicious_v(daily, config), trend_collapse(daily, config)]
        .into_iter()
        .flatten()
        .collect()
}

/// Sharp run-up to a recent peak followed by a quick fall from it
pub fn vicious_v(daily: &[Candle], config: &EmergentConfig) -> Option<String> {
    let window = &daily[daily.len().saturating_sub(config.vicious_v_lookback)..];
    if window.len() < 3 {
        return None;
    }

    let (peak_idx, peak) = window
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |(best_i, best), (i, c)| {
            if c.high > best {
                (i, c.high)
            } else {
                (best_i, best)
            }
        });

    let last_idx = window.len() - 1;
    if peak_idx == 0 || peak_idx == last_idx || last_idx - peak_idx > config.vicious_v_fall_bars {
        return None;
    }

    let trough = window[..peak_idx].iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let close = window[last_idx].close;
    if trough <= 0.0 || peak <= 0.0 {
        return None;
    }

    let rise = (peak - trough) / trough;
    let fall = (peak - close) / peak;

    if rise >= config.vicious_v_rise_pct && fall >= config.vicious_v_fall_pct {
        tracing::info!(
            "🔻 Vicious V on 1d: +{:.1}% to {:.4}, then -{:.1}% in {} bars",
            rise * 100.0,
            peak,
            fall * 100.0,
            last_idx - peak_idx
        );
        return Some(format!(
            "SELL_1D_VICIOUS_V_EXIT: +{:.1}% run to {:.4}, -{:.1}% in {} bars",
            rise * 100.0,
            peak,
            fall * 100.0,
            last_idx - peak_idx
        ));
    }

    None
}

/// Fast EMA crossed below the slow EMA recently and price sits clearly under the slow EMA
pub fn trend_collapse(daily: &[Candle], config: &EmergentConfig) -> Option<String> {
    let closes: Vec<f64> = daily.iter().map(|c| c.close).collect();
    let emas = aligned_emas(&closes, config.collapse_fast, config.collapse_slow)?;
    let n = emas.fast.len();
    if n < 2 {
        return None;
    }

    let recent = config.collapse_recent_bars.max(1);
    let first = n.saturating_sub(recent).max(1);
    let crossed = (first..n).any(|i| emas.fast[i - 1] >= emas.slow[i - 1] && emas.fast[i] < emas.slow[i]);

    let slow = emas.slow[n - 1];
    let close = emas.closes[n - 1];

    if crossed && emas.fast[n - 1] < slow && close < slow * (1.0 - config.collapse_buffer_pct) {
        tracing::info!(
            "🔻 1d trend collapse: close {:.4} below EMA{} {:.4}",
            close,
            config.collapse_slow,
            slow
        );
        return Some(format!(
            "SELL_1D_TREND_COLLAPSE: EMA{} crossed below EMA{}, close {:.4} < {:.4}",
            config.collapse_fast, config.collapse_slow, close, slow
        ));
    }

    None
}
