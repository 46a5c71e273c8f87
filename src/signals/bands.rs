use crate::indicators::calculate_bollinger;
use crate::models::Candle;
use crate::settings::RangeConfig;

/// Latest bar traded into the upper Bollinger band and closed bearish back below it
pub fn upper_band_rejection(bars: &[Candle], config: &RangeConfig) -> Option<String> {
    let latest = bars.last()?;
    let closes: Vec<f64> = bars.iter().map(|c| c.close).collect();
    let bands = calculate_bollinger(&closes, config.bb_period, config.bb_std_mult)?;

    if latest.high >= bands.upper && latest.is_bearish() && latest.close < bands.upper {
        return Some(format!(
            "SELL_RANGE_UPPER_BB_REJECTION: {} high {:.4} >= upper {:.4}, close {:.4}",
            latest.timeframe, latest.high, bands.upper, latest.close
        ));
    }

    None
}
