use crate::models::{Timeframe, TradeMode};
use crate::signals::SignalBook;

/// Entry verdict for a flat symbol
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCandidate {
    pub buy: bool,
    /// Mode to open the position in; `None` when not buying
    pub mode: Option<TradeMode>,
    pub reasons: Vec<String>,
}

impl EntryCandidate {
    fn none() -> Self {
        Self {
            buy: false,
            mode: None,
            reasons: Vec::new(),
        }
    }
}

/// Decide whether to open a position.
///
/// A 1h entry signal is required. Concurrent 4h/1d entry signals only pick a
/// higher opening mode, with 1D taking precedence over 4H.
pub fn decide_entry(book: &SignalBook) -> EntryCandidate {
    if !book.should_buy(Timeframe::H1) {
        if book.should_buy(Timeframe::H4) || book.should_buy(Timeframe::D1) {
            tracing::debug!("Higher-timeframe entry signal without 1h confirmation, holding");
        }
        return EntryCandidate::none();
    }

    let mut mode = TradeMode::Mode1H;
    let mut reasons = book.entry_reasons(Timeframe::H1);

    if book.should_buy(Timeframe::H4) {
        mode = TradeMode::Mode4H;
        reasons.extend(book.entry_reasons(Timeframe::H4));
    }

    if book.should_buy(Timeframe::D1) {
        mode = TradeMode::Mode1D;
        reasons.extend(book.entry_reasons(Timeframe::D1));
    }

    tracing::info!("💰 BUY signal, opening in {} ({})", mode, reasons.join(", "));

    EntryCandidate {
        buy: true,
        mode: Some(mode),
        reasons,
    }
}
