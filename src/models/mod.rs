use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::audit::TriggerRecord;

/// Bar timeframes handled by the engine.
///
/// Ordered from shortest to longest. Only `H1` arrives from the feed,
/// the rest are built by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::H1, Timeframe::H4, Timeframe::D1, Timeframe::W1];

    /// Timeframes that carry entry/exit signal evaluators.
    pub const SIGNAL: [Timeframe; 3] = [Timeframe::H1, Timeframe::H4, Timeframe::D1];

    /// Timeframes built from 1h bars.
    pub const AGGREGATED: [Timeframe; 3] = [Timeframe::H4, Timeframe::D1, Timeframe::W1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// Upper-case label used in trigger reasons (`SELL_RSI_4H_SPIKE`)
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::H1 => "1H",
            Timeframe::H4 => "4H",
            Timeframe::D1 => "1D",
            Timeframe::W1 => "1W",
        }
    }

    pub fn duration_secs(&self) -> i64 {
        match self {
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 4 * 3_600,
            Timeframe::D1 => 24 * 3_600,
            Timeframe::W1 => 7 * 24 * 3_600,
        }
    }

    /// Number of 1h bars that make up one bar of this timeframe
    pub fn hourly_bars(&self) -> usize {
        (self.duration_secs() / Timeframe::H1.duration_secs()) as usize
    }

    /// Offset of the bucket grid from the unix epoch.
    ///
    /// The epoch fell on a Thursday; weekly bars close on Monday 00:00 UTC.
    fn grid_offset_secs(&self) -> i64 {
        match self {
            Timeframe::W1 => 4 * 24 * 3_600,
            _ => 0,
        }
    }

    /// Close time of the bucket that a bar closing at `timestamp` belongs to:
    /// the smallest boundary of this timeframe that is >= `timestamp`.
    pub fn bucket_end(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let size = self.duration_secs();
        let offset = self.grid_offset_secs();
        let shifted = timestamp.timestamp() - offset;
        let end = shifted.div_euclid(size) * size + if shifted.rem_euclid(size) == 0 { 0 } else { size };

        DateTime::from_timestamp(end + offset, 0).unwrap_or(timestamp)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OHLCV bar. `timestamp` is the bar close time; a closed bar is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Feeds send hourly bars without a timeframe
    #[serde(default = "hourly")]
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

fn hourly() -> Timeframe {
    Timeframe::H1
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }
}

/// Management timeframe of an open position.
///
/// Ordering is `Mode1H < Mode4H < Mode1D`; a position only ever moves up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TradeMode {
    #[serde(rename = "MODE_1H")]
    Mode1H,
    #[serde(rename = "MODE_4H")]
    Mode4H,
    #[serde(rename = "MODE_1D")]
    Mode1D,
}

impl TradeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeMode::Mode1H => "MODE_1H",
            TradeMode::Mode4H => "MODE_4H",
            TradeMode::Mode1D => "MODE_1D",
        }
    }

    /// Timeframe whose signals manage a position in this mode
    pub fn timeframe(&self) -> Timeframe {
        match self {
            TradeMode::Mode1H => Timeframe::H1,
            TradeMode::Mode4H => Timeframe::H4,
            TradeMode::Mode1D => Timeframe::D1,
        }
    }
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MODE_1H" => Ok(TradeMode::Mode1H),
            "MODE_4H" => Ok(TradeMode::Mode4H),
            "MODE_1D" => Ok(TradeMode::Mode1D),
            other => Err(other.to_string()),
        }
    }
}

/// Symbol configuration exactly as the external store holds it.
///
/// `trade_mode` stays a raw string so that unknown values surface as
/// `EngineError::UnknownTradeMode` instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSymbolConfig {
    #[serde(default)]
    pub has_position: bool,
    #[serde(default)]
    pub avg_entry_price: Option<f64>,
    #[serde(default)]
    pub trade_mode: Option<String>,
}

/// Validated symbol configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub has_position: bool,
    pub avg_entry_price: Option<f64>,
    pub trade_mode: Option<TradeMode>,
}

impl From<&SymbolConfig> for StoredSymbolConfig {
    fn from(config: &SymbolConfig) -> Self {
        Self {
            has_position: config.has_position,
            avg_entry_price: config.avg_entry_price,
            trade_mode: config.trade_mode.map(|m| m.as_str().to_string()),
        }
    }
}

/// Swing high/low trackers per management timeframe
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtremaState {
    pub top_1h: Option<f64>,
    pub top_4h: Option<f64>,
    pub top_1d: Option<f64>,
    pub bottom_1h: Option<f64>,
    pub bottom_4h: Option<f64>,
    pub bottom_1d: Option<f64>,
}

impl ExtremaState {
    pub fn top(&self, timeframe: Timeframe) -> Option<f64> {
        match timeframe {
            Timeframe::H1 => self.top_1h,
            Timeframe::H4 => self.top_4h,
            Timeframe::D1 => self.top_1d,
            Timeframe::W1 => None,
        }
    }

    pub fn bottom(&self, timeframe: Timeframe) -> Option<f64> {
        match timeframe {
            Timeframe::H1 => self.bottom_1h,
            Timeframe::H4 => self.bottom_4h,
            Timeframe::D1 => self.bottom_1d,
            Timeframe::W1 => None,
        }
    }

    fn top_mut(&mut self, timeframe: Timeframe) -> Option<&mut Option<f64>> {
        match timeframe {
            Timeframe::H1 => Some(&mut self.top_1h),
            Timeframe::H4 => Some(&mut self.top_4h),
            Timeframe::D1 => Some(&mut self.top_1d),
            Timeframe::W1 => None,
        }
    }

    fn bottom_mut(&mut self, timeframe: Timeframe) -> Option<&mut Option<f64>> {
        match timeframe {
            Timeframe::H1 => Some(&mut self.bottom_1h),
            Timeframe::H4 => Some(&mut self.bottom_4h),
            Timeframe::D1 => Some(&mut self.bottom_1d),
            Timeframe::W1 => None,
        }
    }

    pub fn clear_tops(&mut self) {
        self.top_1h = None;
        self.top_4h = None;
        self.top_1d = None;
    }

    pub fn clear_bottom(&mut self, timeframe: Timeframe) {
        if let Some(slot) = self.bottom_mut(timeframe) {
            *slot = None;
        }
    }

    /// Widen the trackers of `timeframe` with a newly seen bar
    pub fn observe(&mut self, timeframe: Timeframe, high: f64, low: f64) {
        if let Some(top) = self.top_mut(timeframe) {
            *top = Some(top.map_or(high, |t| t.max(high)));
        }
        if let Some(bottom) = self.bottom_mut(timeframe) {
            *bottom = Some(bottom.map_or(low, |b| b.min(low)));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// Final output of one evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// Mode the position is (or will be) managed in; `None` only when flat and holding.
    pub trade_mode: Option<TradeMode>,
    pub triggers: TriggerRecord,
    pub stopline_breached: bool,
}
