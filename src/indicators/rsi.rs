/// Calculate Relative Strength Index (RSI)
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    calculate_rsi_series(prices, period).last().copied()
}

/// RSI for every bar that has a full window behind it.
///
/// Element `i` of the result is the RSI as of `prices[i + period]`, so the
/// last element always belongs to the latest price. Empty when there are
/// fewer than `period + 1` prices.
pub fn calculate_rsi_series(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period + 1 {
        return Vec::new();
    }

    // Split price changes into gains and losses
    let (gains, losses): (Vec<f64>, Vec<f64>) = prices
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            if change > 0.0 {
                (change, 0.0)
            } else {
                (0.0, change.abs())
            }
        })
        .unzip();

    gains
        .windows(period)
        .zip(losses.windows(period))
        .map(|(g, l)| {
            let avg_gain = g.iter().sum::<f64>() / period as f64;
            let avg_loss = l.iter().sum::<f64>() / period as f64;

            if avg_loss == 0.0 {
                return 100.0;
            }

            let rs = avg_gain / avg_loss;
            100.0 - (100.0 / (1.0 + rs))
        })
        .collect()
}
