use thiserror::Error;

use crate::models::Timeframe;

/// Errors raised while running one evaluation cycle.
///
/// `InsufficientHistory` is recovered inside the cycle (the timeframe is skipped);
/// every other variant aborts the cycle without producing a decision.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("insufficient history for {timeframe}: {available} closed bars, need {required}")]
    InsufficientHistory {
        timeframe: Timeframe,
        available: usize,
        required: usize,
    },

    #[error("invalid config for {symbol}: {reason}")]
    InvalidConfig { symbol: String, reason: String },

    #[error("unknown trade mode for {symbol}: {value:?}")]
    UnknownTradeMode { symbol: String, value: String },

    #[error("malformed candle stream: {0}")]
    MalformedCandles(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
