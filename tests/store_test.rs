use chrono::{Duration, TimeZone, Utc};
use mtfbot::*;

fn create_test_candles(closes: &[f64]) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 1, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timeframe: Timeframe::H1,
                timestamp: start + Duration::hours(i as i64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[tokio::test]
async fn test_cycle_state_persists_between_runs() {
    let store = MemorySymbolStore::new();
    let engine = DecisionEngine::default();

    let mut closes: Vec<f64> = (0..16).map(|i| 120.0 - i as f64).collect();
    closes.push(114.0);

    // First cycle opens a position
    let stored = store.load("SOL").await.unwrap();
    let outcome = engine
        .evaluate(CycleInput {
            symbol: "SOL".to_string(),
            hourly: create_test_candles(&closes),
            stored,
            as_of: None,
        })
        .unwrap();
    assert_eq!(outcome.decision.action, Action::Buy);
    store.save("SOL", &outcome.into_stored()).await.unwrap();

    let reloaded = store.load("SOL").await.unwrap();
    assert!(reloaded.config.has_position);
    assert_eq!(reloaded.config.avg_entry_price, Some(114.0));
    assert_eq!(reloaded.config.trade_mode.as_deref(), Some("MODE_1H"));
    // 17 bars from 01:00 leave the 16:00-20:00 bucket open
    assert_eq!(reloaded.pending.h4.as_ref().map(|p| p.bars), Some(1));

    // Other symbols are untouched
    assert_eq!(store.load("JUP").await.unwrap(), StoredSymbolState::default());
}

#[test]
fn test_seeded_store_blocking() {
    let seeded = StoredSymbolState {
        config: StoredSymbolConfig {
            has_position: true,
            avg_entry_price: Some(50.0),
            trade_mode: Some("MODE_4H".to_string()),
        },
        ..StoredSymbolState::default()
    };
    let store = MemorySymbolStore::with_state("SOL", seeded.clone());

    let loaded = tokio_test::block_on(store.load("SOL")).unwrap();
    assert_eq!(loaded, seeded);
}

#[test]
fn test_stored_state_json_shape() {
    let state = StoredSymbolState {
        config: StoredSymbolConfig {
            has_position: true,
            avg_entry_price: Some(50.0),
            trade_mode: Some("MODE_1D".to_string()),
        },
        extrema: ExtremaState {
            top_1d: Some(60.0),
            ..ExtremaState::default()
        },
        ..StoredSymbolState::default()
    };

    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["config"]["trade_mode"], "MODE_1D");
    assert_eq!(json["extrema"]["top_1d"], 60.0);

    let back: StoredSymbolState = serde_json::from_value(json).unwrap();
    assert_eq!(back, state);
}
