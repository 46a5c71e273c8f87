use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::Timeframe;
use crate::regime::MarketRegime;

/// Static configuration for the decision engine.
///
/// Every numeric threshold is a placeholder default meant to be tuned; none
/// of them is derived from market data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rsi: RsiConfig,
    pub kline: KlineConfig,
    pub trend: TrendConfig,
    pub emergent: EmergentConfig,
    pub range: RangeConfig,
    pub profit_guard: ProfitGuardConfig,
    pub stopline: StoplineConfig,
    pub market_regime: MarketRegime,
}

impl EngineConfig {
    /// Closed bars a timeframe needs before its evaluators run
    pub fn required_bars(&self, timeframe: Timeframe) -> usize {
        match timeframe {
            Timeframe::W1 => self.trend.weekly_slow.max(1),
            tf => self.rsi.for_timeframe(tf).period + 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiConfig {
    pub h1: RsiTimeframeConfig,
    pub h4: RsiTimeframeConfig,
    pub d1: RsiTimeframeConfig,
}

impl RsiConfig {
    /// Weekly bars have no RSI evaluator; they fall back to the daily settings
    pub fn for_timeframe(&self, timeframe: Timeframe) -> &RsiTimeframeConfig {
        match timeframe {
            Timeframe::H1 => &self.h1,
            Timeframe::H4 => &self.h4,
            Timeframe::D1 | Timeframe::W1 => &self.d1,
        }
    }
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            h1: RsiTimeframeConfig {
                period: 14,
                oversold: 30.0,
                reversal: RsiReversalParams {
                    enabled: true,
                    style: ReversalStyle::Spike,
                    lookback: 3,
                    high: 75.0,
                    drop: 10.0,
                },
                peak: RsiPeakParams {
                    enabled: false,
                    overbought: 70.0,
                },
            },
            h4: RsiTimeframeConfig {
                period: 14,
                oversold: 30.0,
                reversal: RsiReversalParams {
                    enabled: true,
                    style: ReversalStyle::Spike,
                    lookback: 3,
                    high: 75.0,
                    drop: 10.0,
                },
                peak: RsiPeakParams {
                    enabled: true,
                    overbought: 70.0,
                },
            },
            d1: RsiTimeframeConfig {
                period: 14,
                oversold: 35.0,
                reversal: RsiReversalParams {
                    enabled: true,
                    style: ReversalStyle::PreWave,
                    lookback: 5,
                    high: 70.0,
                    drop: 8.0,
                },
                peak: RsiPeakParams {
                    enabled: true,
                    overbought: 70.0,
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiTimeframeConfig {
    pub period: usize,
    /// Entry fires when RSI recovers up through this level
    pub oversold: f64,
    pub reversal: RsiReversalParams,
    pub peak: RsiPeakParams,
}

impl Default for RsiTimeframeConfig {
    fn default() -> Self {
        RsiConfig::default().h1
    }
}

/// Label a reversal exit is reported under; the algorithm is the same
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalStyle {
    Spike,
    PreWave,
}

/// Fast RSI reversal: RSI reached `high` within `lookback` bars and has
/// since fallen at least `drop` points from that max.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiReversalParams {
    pub enabled: bool,
    pub style: ReversalStyle,
    pub lookback: usize,
    pub high: f64,
    pub drop: f64,
}

impl Default for RsiReversalParams {
    fn default() -> Self {
        Self {
            enabled: true,
            style: ReversalStyle::Spike,
            lookback: 3,
            high: 75.0,
            drop: 10.0,
        }
    }
}

/// RSI crossing back below `overbought`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiPeakParams {
    pub enabled: bool,
    pub overbought: f64,
}

impl Default for RsiPeakParams {
    fn default() -> Self {
        Self {
            enabled: true,
            overbought: 70.0,
        }
    }
}

/// Candlestick pattern parameters, shared by all timeframes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KlineConfig {
    /// Bars before the latest one used for swing highs/lows and trend context
    pub lookback: usize,
    /// Minimum share of the bar range the rejection wick must cover
    pub wick_share: f64,
    /// Maximum share of the bar range the opposite wick may cover
    pub opposite_wick_max_share: f64,
    /// Minimum body/range share of the engulfing bar
    pub min_body_share: f64,
}

impl Default for KlineConfig {
    fn default() -> Self {
        Self {
            lookback: 5,
            wick_share: 0.6,
            opposite_wick_max_share: 0.15,
            min_body_share: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub weekly_fast: usize,
    pub weekly_slow: usize,
    /// Suppress management-axis exits while the weekly trend is up
    pub weekly_hold_filter: bool,
    pub promotion_fast: usize,
    pub promotion_slow: usize,
    /// Max fast/slow gap (fraction of slow) that counts as "about to cross"
    pub near_pct: f64,
    /// Consecutive bars above the cross that confirm the trend
    pub confirm_bars: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            weekly_fast: 5,
            weekly_slow: 13,
            weekly_hold_filter: true,
            promotion_fast: 9,
            promotion_slow: 21,
            near_pct: 0.005,
            confirm_bars: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergentConfig {
    pub vicious_v_lookback: usize,
    pub vicious_v_rise_pct: f64,
    pub vicious_v_fall_pct: f64,
    /// The fall from the peak must happen within this many daily bars
    pub vicious_v_fall_bars: usize,
    pub collapse_fast: usize,
    pub collapse_slow: usize,
    pub collapse_recent_bars: usize,
    pub collapse_buffer_pct: f64,
}

impl Default for EmergentConfig {
    fn default() -> Self {
        Self {
            vicious_v_lookback: 10,
            vicious_v_rise_pct: 0.15,
            vicious_v_fall_pct: 0.10,
            vicious_v_fall_bars: 3,
            collapse_fast: 9,
            collapse_slow: 21,
            collapse_recent_bars: 3,
            collapse_buffer_pct: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    pub bb_period: usize,
    pub bb_std_mult: f64,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_std_mult: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfitGuardConfig {
    pub enabled: bool,
    /// Exits below this unrealized profit ratio are suppressed (0.05 = +5%)
    pub min_profit_ratio: f64,
}

impl Default for ProfitGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_profit_ratio: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoplineConfig {
    /// Base line below the average entry (0.08 = -8%)
    pub base_stop_pct: f64,
    /// Raise the base line to the management-timeframe swing low
    pub structure_enabled: bool,
    pub structure_buffer_pct: f64,
    pub dynamic_enabled: bool,
    /// Top tracker must reach entry * (1 + activation_pct) to arm the trailing line
    pub activation_pct: f64,
    pub trail_pct: f64,
}

impl Default for StoplineConfig {
    fn default() -> Self {
        Self {
            base_stop_pct: 0.08,
            structure_enabled: true,
            structure_buffer_pct: 0.02,
            dynamic_enabled: true,
            activation_pct: 0.12,
            trail_pct: 0.05,
        }
    }
}

/// Load engine configuration from an optional file plus `MTF__*` environment overrides.
///
/// Nested keys use a double underscore, e.g. `MTF__PROFIT_GUARD__MIN_PROFIT_RATIO=0.03`.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig, ::config::ConfigError> {
    let mut builder = ::config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(::config::File::from(path));
    }

    let settings = builder
        .add_source(
            ::config::Environment::with_prefix("MTF")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: EngineConfig = settings.try_deserialize()?;

    tracing::debug!(
        "Loaded engine config (regime={}, profit guard={:.2}%)",
        config.market_regime.as_str(),
        config.profit_guard.min_profit_ratio * 100.0
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_exit_styles() {
        let config = EngineConfig::default();

        assert_eq!(config.rsi.h1.reversal.style, ReversalStyle::Spike);
        assert!(!config.rsi.h1.peak.enabled);
        assert_eq!(config.rsi.d1.reversal.style, ReversalStyle::PreWave);
        assert!(config.rsi.h4.peak.enabled);
        assert_eq!(config.market_regime, MarketRegime::Normal);
    }

    #[test]
    fn test_required_bars() {
        let config = EngineConfig::default();
        assert_eq!(config.required_bars(Timeframe::H4), 16);
        assert_eq!(config.required_bars(Timeframe::W1), 13);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "profit_guard": { "min_profit_ratio": 0.02 }, "market_regime": "RANGE" }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.profit_guard.min_profit_ratio, 0.02);
        assert!(config.profit_guard.enabled);
        assert_eq!(config.market_regime, MarketRegime::Range);
        assert_eq!(config.stopline, StoplineConfig::default());
    }

    #[test]
    fn test_load_without_file_gives_defaults() {
        let config = load_engine_config(None).unwrap();
        assert_eq!(config.stopline.base_stop_pct, 0.08);
    }

    #[test]
    fn test_sample_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/engine.toml");
        let config = load_engine_config(Some(path.as_path())).unwrap();

        assert_eq!(config, EngineConfig::default());
    }
}
