use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, EngineResult};
use crate::models::{Candle, Timeframe};

/// In-progress higher-timeframe bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialBar {
    /// Close time of the bucket
    pub end: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Number of 1h bars folded in so far
    pub bars: usize,
    /// Close time of the last 1h bar folded in
    pub last: DateTime<Utc>,
}

impl PartialBar {
    fn from_candle(end: DateTime<Utc>, candle: &Candle) -> Self {
        Self {
            end,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            bars: 1,
            last: candle.timestamp,
        }
    }

    fn fold(&mut self, candle: &Candle) {
        self.high = self.high.max(candle.high);
        self.low = self.low.min(candle.low);
        self.close = candle.close;
        self.volume += candle.volume;
        self.bars += 1;
        self.last = candle.timestamp;
    }

    fn into_candle(self, timeframe: Timeframe) -> Candle {
        Candle {
            timeframe,
            timestamp: self.end,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Partially built 4h/1d/1w bars carried from one cycle to the next
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingAggregates {
    pub h4: Option<PartialBar>,
    pub d1: Option<PartialBar>,
    pub w1: Option<PartialBar>,
}

impl PendingAggregates {
    fn slot_mut(&mut self, timeframe: Timeframe) -> Option<&mut Option<PartialBar>> {
        match timeframe {
            Timeframe::H4 => Some(&mut self.h4),
            Timeframe::D1 => Some(&mut self.d1),
            Timeframe::W1 => Some(&mut self.w1),
            Timeframe::H1 => None,
        }
    }
}

/// Builds closed 4h, 1d and 1w bars from a 1h stream.
///
/// A higher-timeframe bar is emitted only once its final hour has arrived and
/// it holds the full number of 1h bars. Buckets the stream enters mid-way are
/// completed from the carried accumulator when it covers the missing hours,
/// otherwise they are dropped.
#[derive(Debug, Default)]
pub struct CandleAggregator {
    carried: PendingAggregates,
    building: PendingAggregates,
}

impl CandleAggregator {
    /// Continue from the accumulator left by the previous cycle
    pub fn resume(carried: PendingAggregates) -> Self {
        Self {
            carried,
            building: PendingAggregates::default(),
        }
    }

    /// Fold one closed 1h candle; returns the higher-timeframe bars it closed
    pub fn push(&mut self, candle: &Candle) -> Vec<Candle> {
        let mut closed = Vec::new();

        for timeframe in Timeframe::AGGREGATED {
            let end = timeframe.bucket_end(candle.timestamp);
            let current = self.building.slot_mut(timeframe).and_then(Option::take);

            let bar = match current {
                Some(mut bar) if bar.end == end => {
                    if candle.timestamp > bar.last {
                        bar.fold(candle);
                    }
                    bar
                }
                other => {
                    if let Some(stale) = other {
                        tracing::debug!(
                            "Dropping incomplete {} bar ending {} ({}/{} bars)",
                            timeframe,
                            stale.end,
                            stale.bars,
                            timeframe.hourly_bars()
                        );
                    }
                    self.start_bucket(timeframe, end, candle)
                }
            };

            if candle.timestamp == end {
                if bar.bars == timeframe.hourly_bars() {
                    closed.push(bar.into_candle(timeframe));
                } else {
                    tracing::debug!(
                        "Discarding partial {} bar ending {}: {}/{} hourly bars",
                        timeframe,
                        end,
                        bar.bars,
                        timeframe.hourly_bars()
                    );
                }
            } else if let Some(slot) = self.building.slot_mut(timeframe) {
                *slot = Some(bar);
            }
        }

        closed
    }

    /// Accumulator to carry into the next cycle
    pub fn finish(self) -> PendingAggregates {
        self.building
    }

    fn start_bucket(&mut self, timeframe: Timeframe, end: DateTime<Utc>, candle: &Candle) -> PartialBar {
        let first_hour = end - Duration::seconds(timeframe.duration_secs() - Timeframe::H1.duration_secs());

        if candle.timestamp > first_hour {
            let previous_hour = candle.timestamp - Duration::seconds(Timeframe::H1.duration_secs());
            let seed = self
                .carried
                .slot_mut(timeframe)
                .and_then(Option::take)
                .filter(|seed| seed.end == end && seed.last >= previous_hour);

            if let Some(mut seed) = seed {
                if candle.timestamp > seed.last {
                    seed.fold(candle);
                }
                return seed;
            }
        }

        PartialBar::from_candle(end, candle)
    }
}

/// Closed bars per timeframe, oldest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeframeHistory {
    bars: BTreeMap<Timeframe, Vec<Candle>>,
}

impl TimeframeHistory {
    pub fn closed(&self, timeframe: Timeframe) -> &[Candle] {
        self.bars.get(&timeframe).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest(&self, timeframe: Timeframe) -> Option<&Candle> {
        self.closed(timeframe).last()
    }

    /// Closed bars of `timeframe`, or `InsufficientHistory` if fewer than `required`
    pub fn require(&self, timeframe: Timeframe, required: usize) -> EngineResult<&[Candle]> {
        let bars = self.closed(timeframe);
        if bars.len() < required {
            return Err(EngineError::InsufficientHistory {
                timeframe,
                available: bars.len(),
                required,
            });
        }
        Ok(bars)
    }

    fn push(&mut self, candle: Candle) {
        self.bars.entry(candle.timeframe).or_default().push(candle);
    }
}

/// Result of aggregating one cycle's 1h window
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub history: TimeframeHistory,
    pub pending: PendingAggregates,
}

impl Aggregation {
    /// Higher-timeframe bars closed during this pass
    pub fn newly_closed(&self) -> impl Iterator<Item = &Candle> {
        Timeframe::AGGREGATED
            .into_iter()
            .flat_map(move |tf| self.history.closed(tf).iter())
    }
}

/// Check that a 1h stream is non-empty, hour-aligned, ordered and gap-free
pub fn validate_hourly_stream(candles: &[Candle]) -> EngineResult<()> {
    let step = Timeframe::H1.duration_secs();

    if candles.is_empty() {
        return Err(EngineError::MalformedCandles("no 1h candles supplied".to_string()));
    }

    for candle in candles {
        if candle.timeframe != Timeframe::H1 {
            return Err(EngineError::MalformedCandles(format!(
                "expected 1h candles, got a {} bar at {}",
                candle.timeframe, candle.timestamp
            )));
        }
        if candle.timestamp.timestamp().rem_euclid(step) != 0 {
            return Err(EngineError::MalformedCandles(format!(
                "candle at {} is not aligned to the hour",
                candle.timestamp
            )));
        }
    }

    for window in candles.windows(2) {
        let diff = (window[1].timestamp - window[0].timestamp).num_seconds();

        if diff <= 0 {
            return Err(EngineError::MalformedCandles(format!(
                "candles are not sorted by timestamp ({} then {})",
                window[0].timestamp, window[1].timestamp
            )));
        }
        if diff != step {
            return Err(EngineError::MalformedCandles(format!(
                "data gap detected: {}s between {} and {} (expected {}s)",
                diff, window[0].timestamp, window[1].timestamp, step
            )));
        }
    }

    Ok(())
}

/// Validate the 1h window and build the closed history of every timeframe
pub fn aggregate(hourly: &[Candle], carried: PendingAggregates) -> EngineResult<Aggregation> {
    validate_hourly_stream(hourly)?;

    let mut aggregator = CandleAggregator::resume(carried);
    let mut history = TimeframeHistory::default();

    for candle in hourly {
        history.push(candle.clone());
        for closed in aggregator.push(candle) {
            history.push(closed);
        }
    }

    tracing::debug!(
        "Aggregated {} hourly bars into {} 4h, {} 1d, {} 1w bars",
        hourly.len(),
        history.closed(Timeframe::H4).len(),
        history.closed(Timeframe::D1).len(),
        history.closed(Timeframe::W1).len()
    );

    Ok(Aggregation {
        history,
        pending: aggregator.finish(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hour(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    /// 1h candles closing at `first`, `first + 1h`, ...
    fn hourly(first: DateTime<Utc>, closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timeframe: Timeframe::H1,
                timestamp: first + Duration::hours(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_four_hour_bar_rules() {
        let candles = hourly(hour(2024, 3, 4, 1), &[100.0, 104.0, 98.0, 101.0]);
        let result = aggregate(&candles, PendingAggregates::default()).unwrap();

        let bars = result.history.closed(Timeframe::H4);
        assert_eq!(bars.len(), 1);

        let bar = &bars[0];
        assert_eq!(bar.timestamp, hour(2024, 3, 4, 4));
        assert_eq!(bar.open, 99.5); // first bar's open
        assert_eq!(bar.close, 101.0); // last bar's close
        assert_eq!(bar.high, 105.0);
        assert_eq!(bar.low, 97.0);
        assert_eq!(bar.volume, 40.0);
        assert!(result.pending.h4.is_none());
    }

    #[test]
    fn test_partial_leading_bucket_is_dropped() {
        // Starts at 02:00, so the bucket closing at 04:00 only sees 3 bars
        let candles = hourly(hour(2024, 3, 4, 2), &[100.0; 7]);
        let result = aggregate(&candles, PendingAggregates::default()).unwrap();

        let bars = result.history.closed(Timeframe::H4);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, hour(2024, 3, 4, 8));
    }

    #[test]
    fn test_open_bucket_stays_pending() {
        let candles = hourly(hour(2024, 3, 4, 1), &[100.0, 101.0]);
        let result = aggregate(&candles, PendingAggregates::default()).unwrap();

        assert!(result.history.closed(Timeframe::H4).is_empty());
        let pending = result.pending.h4.unwrap();
        assert_eq!(pending.bars, 2);
        assert_eq!(pending.end, hour(2024, 3, 4, 4));
    }

    #[test]
    fn test_resume_completes_carried_bucket() {
        let first = aggregate(&hourly(hour(2024, 3, 4, 1), &[100.0, 101.0]), PendingAggregates::default())
            .unwrap();

        let second = aggregate(&hourly(hour(2024, 3, 4, 3), &[102.0, 103.0]), first.pending).unwrap();

        let bars = second.history.closed(Timeframe::H4);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open, 99.5);
        assert_eq!(bars[0].close, 103.0);
        assert_eq!(bars[0].volume, 40.0);
    }

    #[test]
    fn test_overlapping_window_does_not_double_count() {
        let first = aggregate(&hourly(hour(2024, 3, 4, 1), &[100.0, 101.0]), PendingAggregates::default())
            .unwrap();

        // Caller re-sends the whole bucket plus the two new hours
        let second = aggregate(
            &hourly(hour(2024, 3, 4, 1), &[100.0, 101.0, 102.0, 103.0]),
            first.pending,
        )
        .unwrap();

        let bars = second.history.closed(Timeframe::H4);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 40.0);
    }

    #[test]
    fn test_daily_bar_from_full_day() {
        let closes: Vec<f64> = (0..24).map(|i| 100.0 + i as f64).collect();
        let candles = hourly(hour(2024, 3, 4, 1), &closes);
        let result = aggregate(&candles, PendingAggregates::default()).unwrap();

        let days = result.history.closed(Timeframe::D1);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].timestamp, hour(2024, 3, 5, 0));
        assert_eq!(days[0].close, 123.0);
        assert_eq!(result.history.closed(Timeframe::H4).len(), 6);
        assert_eq!(result.newly_closed().count(), 7);
    }

    #[test]
    fn test_require_reports_insufficient_history() {
        let candles = hourly(hour(2024, 3, 4, 1), &[100.0; 8]);
        let result = aggregate(&candles, PendingAggregates::default()).unwrap();

        let err = result.history.require(Timeframe::H4, 16).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientHistory {
                timeframe: Timeframe::H4,
                available: 2,
                required: 16,
            }
        );
        assert!(result.history.require(Timeframe::H1, 8).is_ok());
    }

    #[test]
    fn test_gap_detected() {
        let mut candles = hourly(hour(2024, 3, 4, 1), &[100.0; 3]);
        candles[2].timestamp = hour(2024, 3, 4, 5);

        let err = validate_hourly_stream(&candles).unwrap_err();
        assert!(err.to_string().contains("gap"));
    }

    #[test]
    fn test_backwards_timestamps_fail() {
        let mut candles = hourly(hour(2024, 3, 4, 1), &[100.0; 2]);
        candles.reverse();

        let err = validate_hourly_stream(&candles).unwrap_err();
        assert!(err.to_string().contains("not sorted"));
    }

    #[test]
    fn test_wrong_timeframe_rejected() {
        let mut candles = hourly(hour(2024, 3, 4, 1), &[100.0; 2]);
        candles[1].timeframe = Timeframe::H4;

        assert!(matches!(
            validate_hourly_stream(&candles),
            Err(EngineError::MalformedCandles(_))
        ));
    }

    #[test]
    fn test_empty_stream_rejected() {
        assert!(validate_hourly_stream(&[]).is_err());
    }
}
