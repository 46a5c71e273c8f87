// Trend filter: weekly hold gate and EMA-trend phases for mode promotion
use serde::{Deserialize, Serialize};

use crate::indicators::{calculate_ema, calculate_ema_series};

/// Direction of the weekly trend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WeeklyTrend {
    Up,
    Down,
    Neutral,
    /// Not enough closed weekly bars
    #[default]
    Unknown,
}

impl WeeklyTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeeklyTrend::Up => "UP",
            WeeklyTrend::Down => "DOWN",
            WeeklyTrend::Neutral => "NEUTRAL",
            WeeklyTrend::Unknown => "UNKNOWN",
        }
    }
}

/// Up when the fast EMA and the last close are both above the slow EMA,
/// down when both are below it.
pub fn weekly_trend(closes: &[f64], fast: usize, slow: usize) -> WeeklyTrend {
    let (Some(fast_ema), Some(slow_ema), Some(&close)) = (
        calculate_ema(closes, fast),
        calculate_ema(closes, slow),
        closes.last(),
    ) else {
        return WeeklyTrend::Unknown;
    };

    let trend = if fast_ema > slow_ema && close > slow_ema {
        WeeklyTrend::Up
    } else if fast_ema < slow_ema && close < slow_ema {
        WeeklyTrend::Down
    } else {
        WeeklyTrend::Neutral
    };

    tracing::debug!(
        "Weekly trend {}: EMA{}={:.4} EMA{}={:.4} close={:.4}",
        trend.as_str(),
        fast,
        fast_ema,
        slow,
        slow_ema,
        close
    );

    trend
}

/// Stage of a bullish fast/slow EMA crossover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmaTrendPhase {
    /// Fast still below slow but closing in
    PreCross,
    /// Fast crossed above slow on the latest bar
    Crossing,
    /// Fast above slow and price above slow for several bars
    Confirmed,
}

impl EmaTrendPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmaTrendPhase::PreCross => "PRE_CROSS",
            EmaTrendPhase::Crossing => "CROSSING",
            EmaTrendPhase::Confirmed => "CONFIRMED",
        }
    }
}

/// Fast and slow EMA series aligned on their common tail, with matching closes
pub(crate) struct AlignedEmas {
    pub fast: Vec<f64>,
    pub slow: Vec<f64>,
    pub closes: Vec<f64>,
}

pub(crate) fn aligned_emas(closes: &[f64], fast: usize, slow: usize) -> Option<AlignedEmas> {
    let fast_series = calculate_ema_series(closes, fast);
    let slow_series = calculate_ema_series(closes, slow);
    let n = fast_series.len().min(slow_series.len());
    if n == 0 {
        return None;
    }

    Some(AlignedEmas {
        fast: fast_series[fast_series.len() - n..].to_vec(),
        slow: slow_series[slow_series.len() - n..].to_vec(),
        closes: closes[closes.len() - n..].to_vec(),
    })
}

/// Current EMA-trend phase, or None when no phase applies
pub fn ema_phase(
    closes: &[f64],
    fast: usize,
    slow: usize,
    near_pct: f64,
    confirm_bars: usize,
) -> Option<EmaTrendPhase> {
    let emas = aligned_emas(closes, fast, slow)?;
    let n = emas.fast.len();
    if n < 2 {
        return None;
    }

    let (f, s) = (&emas.fast, &emas.slow);

    if f[n - 2] <= s[n - 2] && f[n - 1] > s[n - 1] {
        return Some(EmaTrendPhase::Crossing);
    }

    let confirm = confirm_bars.max(1);
    if n >= confirm && (n - confirm..n).all(|i| f[i] > s[i] && emas.closes[i] > s[i]) {
        return Some(EmaTrendPhase::Confirmed);
    }

    let gap = s[n - 1] - f[n - 1];
    let previous_gap = s[n - 2] - f[n - 2];
    if gap > 0.0 && s[n - 1] > 0.0 && gap / s[n - 1] <= near_pct && gap < previous_gap {
        return Some(EmaTrendPhase::PreCross);
    }

    None
}
