// Technical indicators module
// Implements RSI, SMA/EMA and Bollinger Bands over closing prices

pub mod bollinger;
pub mod moving_average;
pub mod rsi;

pub use bollinger::{calculate_bollinger, BollingerBands};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_sma};
pub use rsi::{calculate_rsi, calculate_rsi_series};
