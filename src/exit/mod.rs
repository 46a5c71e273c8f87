use crate::mode::CycleContext;
use crate::regime::exit_rules;
use crate::settings::EngineConfig;
use crate::signals::{SignalBook, WeeklyTrend};

pub const HOLD_WEEKLY_UPTREND: &str = "HOLD_WEEKLY_UPTREND";
pub const PROFIT_GUARD_SUPPRESSED: &str = "PROFIT_GUARD_SUPPRESSED";
pub const PROFIT_GUARD_SKIPPED_NO_ENTRY_PRICE: &str = "PROFIT_GUARD_SKIPPED_NO_ENTRY_PRICE";

/// Exit verdict for an open position, before the stopline override
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExitCandidate {
    pub sell: bool,
    /// An exit fired but the profit guard held it back
    pub suppressed: bool,
    pub reasons: Vec<String>,
}

/// Decide whether to close the open position on signals.
///
/// Only the management timeframe's exit signals count, plus the emergent
/// daily exits and, in RANGE, the upper band rejection.
pub fn decide_exit(ctx: &CycleContext, book: &SignalBook, config: &EngineConfig) -> ExitCandidate {
    let mut candidate = ExitCandidate::default();

    if !ctx.has_position {
        return candidate;
    }

    let Some(timeframe) = ctx.management_timeframe() else {
        return candidate;
    };

    let rules = exit_rules(config.market_regime);
    let mut fired: Vec<String> = Vec::new();

    if rules.management_axis {
        let axis = book.exit_reasons(timeframe);

        if !axis.is_empty() {
            if config.trend.weekly_hold_filter && book.weekly_trend == WeeklyTrend::Up {
                tracing::info!(
                    "📈 Weekly uptrend, holding through {} {} exit signal(s)",
                    axis.len(),
                    timeframe
                );
                candidate.reasons.push(format!(
                    "{}: ignored {}",
                    HOLD_WEEKLY_UPTREND,
                    axis.join(" | ")
                ));
            } else {
                fired.extend(axis);
            }
        }
    }

    if rules.emergent {
        fired.extend(book.emergent.iter().cloned());
    }

    if rules.upper_band_rejection {
        if let Some(reason) = book.band_rejection(timeframe) {
            fired.push(reason.to_string());
        }
    }

    if fired.is_empty() {
        return candidate;
    }

    candidate.reasons.extend(fired);

    if config.profit_guard.enabled {
        match ctx.avg_entry_price {
            Some(entry) => {
                let profit_ratio = (book.price - entry) / entry;

                if profit_ratio < config.profit_guard.min_profit_ratio {
                    tracing::info!(
                        "Sell signal ignored - only {:.1}% profit (need {:.1}%)",
                        profit_ratio * 100.0,
                        config.profit_guard.min_profit_ratio * 100.0
                    );
                    candidate.suppressed = true;
                    candidate.reasons.push(format!(
                        "{}: profit {:.1}% < {:.1}%",
                        PROFIT_GUARD_SUPPRESSED,
                        profit_ratio * 100.0,
                        config.profit_guard.min_profit_ratio * 100.0
                    ));
                    return candidate;
                }

                tracing::info!("Sell signal with {:.1}% profit", profit_ratio * 100.0);
            }
            None => {
                tracing::warn!("{}: no entry price, profit guard skipped", ctx.symbol);
                candidate.reasons.push(PROFIT_GUARD_SKIPPED_NO_ENTRY_PRICE.to_string());
            }
        }
    }

    candidate.sell = true;
    candidate
}
