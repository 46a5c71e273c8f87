// Market regime selection
//
// Only the NORMAL path carries full strategy logic today. `exit_rules` is the
// hook where RANGE-specific behaviour plugs in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketRegime {
    #[default]
    Normal,
    Range,
}

impl MarketRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::Normal => "NORMAL",
            MarketRegime::Range => "RANGE",
        }
    }
}

/// Which exit families the exit engine consults for a regime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRuleSet {
    pub management_axis: bool,
    pub emergent: bool,
    pub upper_band_rejection: bool,
}

pub fn exit_rules(regime: MarketRegime) -> ExitRuleSet {
    let normal = ExitRuleSet {
        management_axis: true,
        emergent: true,
        upper_band_rejection: false,
    };

    match regime {
        MarketRegime::Normal => normal,
        MarketRegime::Range => ExitRuleSet {
            upper_band_rejection: true,
            ..normal
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_regime_is_normal() {
        assert_eq!(MarketRegime::default(), MarketRegime::Normal);
    }

    #[test]
    fn test_upper_band_only_in_range() {
        assert!(!exit_rules(MarketRegime::Normal).upper_band_rejection);
        assert!(exit_rules(MarketRegime::Range).upper_band_rejection);
        assert_eq!(
            exit_rules(MarketRegime::Range).management_axis,
            exit_rules(MarketRegime::Normal).management_axis
        );
    }
}
