// Stop-loss engine
// Base line below the average entry (raised to the swing low when enabled),
// plus a trailing line off the management-timeframe top once armed.
// A breach overrides every other exit decision.

use serde::{Deserialize, Serialize};

use crate::mode::CycleContext;
use crate::models::ExtremaState;
use crate::settings::StoplineConfig;
use crate::signals::SignalBook;

pub const MODE_CHANGED_THIS_CYCLE: &str = "MODE_CHANGED_THIS_CYCLE";
pub const FRESH_ENTRY_SIGNAL_ON_MANAGEMENT_TF: &str = "FRESH_ENTRY_SIGNAL_ON_MANAGEMENT_TF";
pub const NOT_ACTIVATED: &str = "NOT_ACTIVATED";
pub const DISABLED_BY_CONFIG: &str = "DISABLED_BY_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StoplineKind {
    Base,
    Dynamic,
}

impl StoplineKind {
    pub fn breach_code(&self) -> &'static str {
        match self {
            StoplineKind::Base => "STOPLINE_BASE_BREACH",
            StoplineKind::Dynamic => "STOPLINE_DYNAMIC_BREACH",
        }
    }
}

/// Stoplines computed for one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoplineReport {
    pub base: Option<f64>,
    pub dynamic: Option<f64>,
    /// Why the dynamic line is off this cycle
    pub dynamic_disabled: Option<String>,
    pub breached: Option<StoplineKind>,
    /// Price the lines were checked against
    pub price: f64,
}

impl StoplineReport {
    /// Trigger reason for a breach, if any
    pub fn breach_reason(&self) -> Option<String> {
        let kind = self.breached?;
        let line = match kind {
            StoplineKind::Base => self.base,
            StoplineKind::Dynamic => self.dynamic,
        }?;

        Some(format!(
            "{}: price {:.4} <= line {:.4}",
            kind.breach_code(),
            self.price,
            line
        ))
    }
}

/// Compute both stoplines for the open position and check them against the last 1h close.
///
/// `structure` holds the trackers as they stood before this cycle's bars were
/// observed. The swing low that raises the base line is read from it.
pub fn evaluate_stoplines(
    ctx: &CycleContext,
    structure: &ExtremaState,
    book: &SignalBook,
    config: &StoplineConfig,
) -> StoplineReport {
    let mut report = StoplineReport {
        price: book.price,
        ..StoplineReport::default()
    };

    let (true, Some(timeframe)) = (ctx.has_position, ctx.management_timeframe()) else {
        return report;
    };

    report.base = ctx.avg_entry_price.map(|entry| {
        let line = entry * (1.0 - config.base_stop_pct);
        match structure.bottom(timeframe) {
            Some(bottom) if config.structure_enabled => line.max(bottom * (1.0 - config.structure_buffer_pct)),
            _ => line,
        }
    });

    let disabled = if !config.dynamic_enabled {
        Some(DISABLED_BY_CONFIG)
    } else if ctx.mode_changed() {
        Some(MODE_CHANGED_THIS_CYCLE)
    } else if book.should_buy(timeframe) {
        Some(FRESH_ENTRY_SIGNAL_ON_MANAGEMENT_TF)
    } else {
        match (ctx.avg_entry_price, ctx.extrema.top(timeframe)) {
            (Some(entry), Some(top)) if top >= entry * (1.0 + config.activation_pct) => {
                report.dynamic = Some(top * (1.0 - config.trail_pct));
                None
            }
            _ => Some(NOT_ACTIVATED),
        }
    };
    report.dynamic_disabled = disabled.map(str::to_string);

    if report.base.is_some_and(|line| book.price <= line) {
        report.breached = Some(StoplineKind::Base);
    } else if report.dynamic.is_some_and(|line| book.price <= line) {
        report.breached = Some(StoplineKind::Dynamic);
    }

    if let Some(kind) = report.breached {
        tracing::warn!(
            "🛑 {}: {} at price {:.4} (base={:?}, dynamic={:?})",
            ctx.symbol,
            kind.breach_code(),
            book.price,
            report.base,
            report.dynamic
        );
    } else {
        tracing::debug!(
            "Stoplines for {} on {}: base={:?} dynamic={:?} ({})",
            ctx.symbol,
            timeframe,
            report.base,
            report.dynamic,
            report.dynamic_disabled.as_deref().unwrap_or("active")
        );
    }

    report
}
