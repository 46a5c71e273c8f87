use super::calculate_sma;

/// Bollinger Bands (SMA-based with population standard deviation)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bands over the last `period` prices, or None if insufficient data
pub fn calculate_bollinger(prices: &[f64], period: usize, std_mult: f64) -> Option<BollingerBands> {
    let middle = calculate_sma(prices, period)?;
    let window = &prices[prices.len() - period..];
    let variance = window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    Some(BollingerBands {
        upper: middle + std_mult * std_dev,
        middle,
        lower: middle - std_mult * std_dev,
    })
}
