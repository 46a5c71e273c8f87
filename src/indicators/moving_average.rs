/// Calculate Simple Moving Average (SMA)
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA)
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    calculate_ema_series(prices, period).last().copied()
}

/// EMA value for every bar from index `period - 1` onwards.
///
/// Seeded with the SMA of the first `period` prices, so element `i` of the
/// result belongs to `prices[i + period - 1]`.
pub fn calculate_ema_series(prices: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || prices.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Start with SMA
    let mut ema = prices[..period].iter().sum::<f64>() / period as f64;
    let mut series = Vec::with_capacity(prices.len() - period + 1);
    series.push(ema);

    for price in &prices[period..] {
        ema = (price - ema) * multiplier + ema;
        series.push(ema);
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        let sma = calculate_sma(&prices, 5);
        assert_eq!(sma, Some(104.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        let sma = calculate_sma(&prices, 5);
        assert!(sma.is_none());
    }

    #[test]
    fn test_ema() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let ema = calculate_ema(&prices, 5);
        assert!(ema.is_some());
        assert!(ema.unwrap() > 104.0); // EMA should be above initial SMA
    }

    #[test]
    fn test_ema_series_alignment() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let series = calculate_ema_series(&prices, 5);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0], 104.0); // seed SMA
        // (110 - 104) * (2 / 6) + 104
        assert!((series[1] - 106.0).abs() < 1e-9);
    }

    #[test]
    fn test_ema_flat_prices() {
        let prices = vec![50.0; 10];
        assert_eq!(calculate_ema(&prices, 3), Some(50.0));
    }
}
