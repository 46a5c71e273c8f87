// Trade-mode state machine
//
// A position is managed on the 1H, 4H or 1D axis. The mode only moves up
// while a position is open; every transition is logged and resets the
// extrema trackers that belonged to the previous axis.

use chrono::{DateTime, Utc};

use crate::audit::{ModeAction, ModeChangeLog, TriggerRecord};
use crate::error::{EngineError, EngineResult};
use crate::models::{ExtremaState, StoredSymbolConfig, SymbolConfig, Timeframe, TradeMode};
use crate::signals::SignalBook;

pub const MODE_INIT_REASON: &str = "hasPosition but no trade_mode => default MODE_1H";

/// Validate a stored symbol configuration.
///
/// While flat, an unusable entry price is dropped and any leftover mode is
/// cleared. While in position it is an error.
pub fn validate_config(symbol: &str, stored: &StoredSymbolConfig) -> EngineResult<SymbolConfig> {
    let trade_mode = match stored.trade_mode.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => Some(value.parse::<TradeMode>().map_err(|value| EngineError::UnknownTradeMode {
            symbol: symbol.to_string(),
            value,
        })?),
    };

    let usable = |p: f64| p.is_finite() && p > 0.0;

    if !stored.has_position {
        return Ok(SymbolConfig {
            has_position: false,
            avg_entry_price: stored.avg_entry_price.filter(|&p| usable(p)),
            trade_mode: None,
        });
    }

    if let Some(price) = stored.avg_entry_price.filter(|&p| !usable(p)) {
        return Err(EngineError::InvalidConfig {
            symbol: symbol.to_string(),
            reason: format!("avg_entry_price must be positive and finite, got {}", price),
        });
    }

    Ok(SymbolConfig {
        has_position: true,
        avg_entry_price: stored.avg_entry_price,
        trade_mode,
    })
}

/// Per-symbol state threaded through one evaluation cycle
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub symbol: String,
    pub has_position: bool,
    pub avg_entry_price: Option<f64>,
    trade_mode: Option<TradeMode>,
    pub extrema: ExtremaState,
    pub triggers: TriggerRecord,
    pub mode_log: ModeChangeLog,
    /// Timestamp stamped on mode-log entries
    pub at: DateTime<Utc>,
    mode_changed: bool,
}

impl CycleContext {
    /// Build the context from stored state, applying MODE_INIT when needed
    pub fn load(
        symbol: &str,
        stored: &StoredSymbolConfig,
        extrema: ExtremaState,
        at: DateTime<Utc>,
    ) -> EngineResult<Self> {
        let config = validate_config(symbol, stored)?;
        Ok(Self::from_config(symbol, &config, extrema, at))
    }

    pub fn from_config(symbol: &str, config: &SymbolConfig, extrema: ExtremaState, at: DateTime<Utc>) -> Self {
        let mut ctx = Self {
            symbol: symbol.to_string(),
            has_position: config.has_position,
            avg_entry_price: config.avg_entry_price,
            trade_mode: if config.has_position { config.trade_mode } else { None },
            extrema,
            triggers: TriggerRecord::new(),
            mode_log: ModeChangeLog::default(),
            at,
            mode_changed: false,
        };

        if ctx.has_position && ctx.trade_mode.is_none() {
            tracing::info!("{}: {}", ctx.symbol, MODE_INIT_REASON);
            ctx.mode_log.push(
                ModeAction::Init,
                None,
                TradeMode::Mode1H,
                &[MODE_INIT_REASON.to_string()],
                at,
            );
            ctx.trade_mode = Some(TradeMode::Mode1H);
        }

        ctx
    }

    pub fn trade_mode(&self) -> Option<TradeMode> {
        self.trade_mode
    }

    /// Management timeframe of the open position
    pub fn management_timeframe(&self) -> Option<Timeframe> {
        self.trade_mode.map(|m| m.timeframe())
    }

    /// True once a MODE_CHANGE happened in this cycle
    pub fn mode_changed(&self) -> bool {
        self.mode_changed
    }

    pub fn config(&self) -> SymbolConfig {
        SymbolConfig {
            has_position: self.has_position,
            avg_entry_price: self.avg_entry_price,
            trade_mode: self.trade_mode,
        }
    }

    /// Move to `next`, recording `reasons`. Returns false when nothing changed.
    ///
    /// Lowering the mode of an open position is refused.
    pub fn change_mode(&mut self, next: TradeMode, reasons: &[String]) -> bool {
        let prev = self.trade_mode;

        if prev == Some(next) {
            return false;
        }

        if self.has_position && prev.is_some_and(|p| next < p) {
            tracing::warn!(
                "{}: refusing to lower trade mode {} -> {}",
                self.symbol,
                prev.map(|p| p.as_str()).unwrap_or("NONE"),
                next
            );
            return false;
        }

        self.triggers.extend(reasons.iter().cloned());

        if self.has_position {
            self.extrema.clear_tops();
            let bottom = match prev {
                Some(TradeMode::Mode1H) => Timeframe::H1,
                Some(TradeMode::Mode1D) => Timeframe::D1,
                Some(TradeMode::Mode4H) | None => Timeframe::H4,
            };
            self.extrema.clear_bottom(bottom);
        }

        self.mode_log.push(ModeAction::Change, prev, next, reasons, self.at);
        self.trade_mode = Some(next);
        self.mode_changed = true;

        tracing::info!(
            "🔀 {}: trade mode {} -> {} ({})",
            self.symbol,
            prev.map(|p| p.as_str()).unwrap_or("NONE"),
            next,
            reasons.join(", ")
        );

        true
    }

    /// Open a position in `mode` at `price`
    pub fn open_position(&mut self, mode: TradeMode, price: f64, reasons: &[String]) {
        self.change_mode(mode, reasons);
        self.triggers.extend(reasons.iter().cloned());
        self.has_position = true;
        self.avg_entry_price = Some(price).filter(|p| p.is_finite() && *p > 0.0);
        self.trade_mode = Some(mode);
    }

    /// Return to flat; the trackers start over with the next position
    pub fn close_position(&mut self) {
        self.has_position = false;
        self.avg_entry_price = None;
        self.trade_mode = None;
        self.extrema = ExtremaState::default();
    }

    /// Widen the trackers with the latest closed bar of each management timeframe
    pub fn update_extrema(&mut self, book: &SignalBook) {
        for timeframe in Timeframe::SIGNAL {
            if let Some(bar) = book.latest.get(&timeframe) {
                self.extrema.observe(timeframe, bar.high, bar.low);
            }
        }
    }
}

/// Promote the open position's mode from this cycle's signals.
///
/// 1D is tried first, 4H only from 1H. Returns the new mode when promoted.
pub fn promote(ctx: &mut CycleContext, book: &SignalBook) -> Option<TradeMode> {
    if !ctx.has_position {
        return None;
    }

    let current = ctx.trade_mode()?;

    if current < TradeMode::Mode1D {
        let reasons = promotion_reasons(book, Timeframe::D1);
        if !reasons.is_empty() && ctx.change_mode(TradeMode::Mode1D, &reasons) {
            return Some(TradeMode::Mode1D);
        }
    }

    if current == TradeMode::Mode1H {
        let reasons = promotion_reasons(book, Timeframe::H4);
        if !reasons.is_empty() && ctx.change_mode(TradeMode::Mode4H, &reasons) {
            return Some(TradeMode::Mode4H);
        }
    }

    None
}

fn promotion_reasons(book: &SignalBook, timeframe: Timeframe) -> Vec<String> {
    if book.is_skipped(timeframe) {
        return Vec::new();
    }

    let mut reasons = Vec::new();

    if let Some(phase) = book.ema_phase(timeframe) {
        reasons.push(format!("PROMOTE_{}_BY_EMA: {}", timeframe.label(), phase.as_str()));
    }

    if book.should_buy(timeframe) {
        reasons.push(format!(
            "PROMOTE_{}_BY_BUY_SIGNAL: {}",
            timeframe.label(),
            book.entry_reasons(timeframe).join(" | ")
        ));
    }

    reasons
}
