// Audit trail for one evaluation cycle: trigger reasons and mode transitions
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TradeMode;

/// Distinct reason strings justifying a cycle's decision, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerRecord(Vec<String>);

impl TriggerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reason; empty strings and duplicates are ignored
    pub fn add(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if reason.is_empty() || self.0.contains(&reason) {
            return;
        }
        self.0.push(reason);
    }

    pub fn extend<I, S>(&mut self, reasons: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for reason in reasons {
            self.add(reason);
        }
    }

    pub fn contains(&self, reason: &str) -> bool {
        self.0.iter().any(|r| r == reason)
    }

    /// True when any reason starts with `prefix` (reasons carry details after the code)
    pub fn contains_code(&self, prefix: &str) -> bool {
        self.0.iter().any(|r| r.starts_with(prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeAction {
    #[serde(rename = "MODE_INIT")]
    Init,
    #[serde(rename = "MODE_CHANGE")]
    Change,
}

/// One trade-mode transition. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeChangeLogEntry {
    pub action: ModeAction,
    pub prev_mode: Option<TradeMode>,
    pub next_mode: TradeMode,
    pub reasons: Vec<String>,
    pub at: DateTime<Utc>,
}

/// Append-only log of mode transitions within a cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeChangeLog(Vec<ModeChangeLogEntry>);

impl ModeChangeLog {
    pub fn push(
        &mut self,
        action: ModeAction,
        prev_mode: Option<TradeMode>,
        next_mode: TradeMode,
        reasons: &[String],
        at: DateTime<Utc>,
    ) {
        self.0.push(ModeChangeLogEntry {
            action,
            prev_mode,
            next_mode,
            reasons: reasons.iter().filter(|r| !r.is_empty()).cloned().collect(),
            at,
        });
    }

    pub fn entries(&self) -> &[ModeChangeLogEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_entries(self) -> Vec<ModeChangeLogEntry> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_deduplication() {
        let mut triggers = TriggerRecord::new();
        triggers.add("SELL_RSI_PEAK_4H");
        triggers.add("SELL_RSI_PEAK_4H");

        assert_eq!(triggers.len(), 1);
    }

    #[test]
    fn test_trigger_insertion_order() {
        let mut triggers = TriggerRecord::new();
        triggers.extend(["B", "A", "B", "C"]);

        let ordered: Vec<&str> = triggers.iter().collect();
        assert_eq!(ordered, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_trigger_ignores_empty() {
        let mut triggers = TriggerRecord::new();
        triggers.add("");
        assert!(triggers.is_empty());
    }

    #[test]
    fn test_contains_code_matches_prefix() {
        let mut triggers = TriggerRecord::new();
        triggers.add("STOPLINE_BASE_BREACH: price 90.00 <= line 92.00");

        assert!(triggers.contains_code("STOPLINE_BASE_BREACH"));
        assert!(!triggers.contains("STOPLINE_BASE_BREACH"));
    }

    #[test]
    fn test_mode_log_filters_empty_reasons() {
        let mut log = ModeChangeLog::default();
        log.push(
            ModeAction::Change,
            Some(TradeMode::Mode1H),
            TradeMode::Mode4H,
            &["PROMOTE_4H_BY_EMA".to_string(), String::new()],
            Utc::now(),
        );

        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].reasons, vec!["PROMOTE_4H_BY_EMA".to_string()]);
    }

    #[test]
    fn test_mode_action_serde_names() {
        assert_eq!(serde_json::to_string(&ModeAction::Init).unwrap(), "\"MODE_INIT\"");
        assert_eq!(serde_json::to_string(&ModeAction::Change).unwrap(), "\"MODE_CHANGE\"");
    }
}
