use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregator::{aggregate, PendingAggregates};
use crate::audit::ModeChangeLogEntry;
use crate::entry::decide_entry;
use crate::error::{EngineError, EngineResult};
use crate::exit::decide_exit;
use crate::mode::{promote, CycleContext};
use crate::models::{Action, Candle, Decision, ExtremaState, SymbolConfig, Timeframe};
use crate::persistence::StoredSymbolState;
use crate::settings::EngineConfig;
use crate::signals::SignalBook;
use crate::stoploss::{evaluate_stoplines, StoplineReport};

/// One cycle's input for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleInput {
    pub symbol: String,
    /// Closed 1h bars, oldest first
    pub hourly: Vec<Candle>,
    #[serde(default)]
    pub stored: StoredSymbolState,
    /// Timestamp for audit entries; defaults to the last 1h close time
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

/// Everything a cycle produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub cycle_id: Uuid,
    pub decision: Decision,
    /// Symbol configuration after this cycle's decision
    pub config: SymbolConfig,
    pub extrema: ExtremaState,
    pub pending: PendingAggregates,
    pub mode_log: Vec<ModeChangeLogEntry>,
    pub skipped_timeframes: Vec<Timeframe>,
    pub stoplines: StoplineReport,
}

impl CycleOutcome {
    /// State to hand back to the store
    pub fn into_stored(self) -> StoredSymbolState {
        StoredSymbolState {
            config: (&self.config).into(),
            extrema: self.extrema,
            pending: self.pending,
        }
    }
}

/// Stateless decision engine. Holds only static configuration, so one
/// instance can serve many symbols from many threads.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    config: EngineConfig,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one evaluation cycle.
    ///
    /// Fails without producing any state on invalid configuration or
    /// malformed candles. Short history on a timeframe only skips it.
    pub fn evaluate(&self, input: CycleInput) -> EngineResult<CycleOutcome> {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", symbol = %input.symbol, %cycle_id);
        let _enter = span.enter();

        let last = input
            .hourly
            .last()
            .ok_or_else(|| EngineError::MalformedCandles("no 1h candles supplied".to_string()))?;
        let price = last.close;
        let at = input.as_of.unwrap_or(last.timestamp);

        let mut ctx = CycleContext::load(&input.symbol, &input.stored.config, input.stored.extrema.clone(), at)?;

        let aggregation = aggregate(&input.hourly, input.stored.pending.clone())?;
        let book = SignalBook::evaluate(&aggregation.history, &self.config, price);

        let (decision, stoplines) = self.decide(&mut ctx, &book);

        tracing::info!(
            "Decision for {}: {:?} mode={} triggers=[{}]",
            input.symbol,
            decision.action,
            decision.trade_mode.map(|m| m.as_str()).unwrap_or("NONE"),
            decision.triggers.iter().collect::<Vec<_>>().join(", ")
        );

        Ok(CycleOutcome {
            cycle_id,
            decision,
            config: ctx.config(),
            extrema: ctx.extrema,
            pending: aggregation.pending,
            mode_log: ctx.mode_log.into_entries(),
            skipped_timeframes: book.skipped,
            stoplines,
        })
    }

    /// Decide on an already evaluated signal book
    pub fn decide(&self, ctx: &mut CycleContext, book: &SignalBook) -> (Decision, StoplineReport) {
        if !ctx.has_position {
            let entry = decide_entry(book);

            return match entry.mode.filter(|_| entry.buy) {
                Some(mode) => {
                    ctx.open_position(mode, book.price, &entry.reasons);
                    let decision = Decision {
                        action: Action::Buy,
                        trade_mode: Some(mode),
                        triggers: ctx.triggers.clone(),
                        stopline_breached: false,
                    };
                    (decision, StoplineReport::default())
                }
                None => {
                    let decision = Decision {
                        action: Action::Hold,
                        trade_mode: None,
                        triggers: ctx.triggers.clone(),
                        stopline_breached: false,
                    };
                    (decision, StoplineReport::default())
                }
            };
        }

        promote(ctx, book);
        let structure = ctx.extrema.clone();
        ctx.update_extrema(book);

        let exit = decide_exit(ctx, book, &self.config);
        ctx.triggers.extend(exit.reasons);

        let stoplines = evaluate_stoplines(ctx, &structure, book, &self.config.stopline);
        let breach = stoplines.breach_reason();

        let action = if breach.is_some() || exit.sell {
            Action::Sell
        } else {
            Action::Hold
        };

        if let Some(reason) = breach {
            ctx.triggers.add(reason);
        }

        let trade_mode = ctx.trade_mode();
        if action == Action::Sell {
            ctx.close_position();
        }

        let decision = Decision {
            action,
            trade_mode,
            triggers: ctx.triggers.clone(),
            stopline_breached: stoplines.breached.is_some(),
        };

        (decision, stoplines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StoredSymbolConfig, TradeMode};
    use crate::signals::SignalKind;

    fn in_position(mode: &str) -> CycleContext {
        let stored = StoredSymbolConfig {
            has_position: true,
            avg_entry_price: Some(100.0),
            trade_mode: Some(mode.to_string()),
        };
        CycleContext::load("SOL", &stored, ExtremaState::default(), Utc::now()).unwrap()
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DecisionEngine>();
    }

    #[test]
    fn test_flat_without_signals_holds() {
        let engine = DecisionEngine::default();
        let mut ctx = CycleContext::load("SOL", &StoredSymbolConfig::default(), ExtremaState::default(), Utc::now())
            .unwrap();

        let (decision, _) = engine.decide(&mut ctx, &SignalBook::new(100.0));

        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.trade_mode, None);
        assert!(decision.triggers.is_empty());
    }

    #[test]
    fn test_sell_projects_flat_state() {
        let engine = DecisionEngine::default();
        let mut ctx = in_position("MODE_1H");
        let book = SignalBook::new(120.0).with_hit(Timeframe::H1, SignalKind::RsiReversalExit, "SELL_RSI_1H_SPIKE");

        let (decision, _) = engine.decide(&mut ctx, &book);

        assert_eq!(decision.action, Action::Sell);
        assert_eq!(decision.trade_mode, Some(TradeMode::Mode1H));
        assert!(!ctx.has_position);
        assert_eq!(ctx.config(), SymbolConfig::default());
    }

    #[test]
    fn test_into_stored_round_trips_mode_string() {
        let outcome = CycleOutcome {
            cycle_id: Uuid::new_v4(),
            decision: Decision {
                action: Action::Buy,
                trade_mode: Some(TradeMode::Mode4H),
                triggers: Default::default(),
                stopline_breached: false,
            },
            config: SymbolConfig {
                has_position: true,
                avg_entry_price: Some(10.0),
                trade_mode: Some(TradeMode::Mode4H),
            },
            extrema: ExtremaState::default(),
            pending: PendingAggregates::default(),
            mode_log: Vec::new(),
            skipped_timeframes: Vec::new(),
            stoplines: StoplineReport::default(),
        };

        let stored = outcome.into_stored();
        assert_eq!(stored.config.trade_mode.as_deref(), Some("MODE_4H"));
        assert_eq!(stored.config.avg_entry_price, Some(10.0));
    }
}
