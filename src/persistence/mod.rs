use crate::aggregator::PendingAggregates;
use crate::models::{ExtremaState, StoredSymbolConfig};
use crate::Result;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{timeout, Duration};

/// Everything persisted per symbol between cycles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSymbolState {
    #[serde(default)]
    pub config: StoredSymbolConfig,
    #[serde(default)]
    pub extrema: ExtremaState,
    #[serde(default)]
    pub pending: PendingAggregates,
}

/// Per-symbol configuration/position store.
///
/// Last writer wins; a symbol with nothing stored loads as flat.
#[allow(async_fn_in_trait)]
pub trait SymbolStore {
    async fn load(&self, symbol: &str) -> Result<StoredSymbolState>;

    async fn save(&self, symbol: &str, state: &StoredSymbolState) -> Result<()>;
}

/// Redis-backed store
///
/// One JSON document per symbol under `symbol_state:{symbol}`
#[derive(Clone)]
pub struct RedisSymbolStore {
    conn: ConnectionManager,
}

impl RedisSymbolStore {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        // Add 5 second timeout to connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| "Redis connection timeout after 5 seconds")??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    fn key(symbol: &str) -> String {
        format!("symbol_state:{}", symbol)
    }
}

impl SymbolStore for RedisSymbolStore {
    async fn load(&self, symbol: &str) -> Result<StoredSymbolState> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(Self::key(symbol)).await?;

        match value {
            Some(json) => {
                let state: StoredSymbolState = serde_json::from_str(&json)?;
                tracing::debug!("Loaded state for {} from Redis", symbol);
                Ok(state)
            }
            None => {
                tracing::info!("No stored state for {}, starting flat", symbol);
                Ok(StoredSymbolState::default())
            }
        }
    }

    async fn save(&self, symbol: &str, state: &StoredSymbolState) -> Result<()> {
        let mut conn = self.conn.clone();
        let value = serde_json::to_string(state)?;

        conn.set::<_, _, ()>(Self::key(symbol), value).await?;

        tracing::debug!("Saved state for {} to Redis", symbol);

        Ok(())
    }
}

/// In-process store, used by tests and by the CLI without `--redis-url`
#[derive(Debug, Clone, Default)]
pub struct MemorySymbolStore {
    states: Arc<Mutex<HashMap<String, StoredSymbolState>>>,
}

impl MemorySymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one symbol's state
    pub fn with_state(symbol: &str, state: StoredSymbolState) -> Self {
        let store = Self::new();
        if let Ok(mut states) = store.states.lock() {
            states.insert(symbol.to_string(), state);
        }
        store
    }
}

impl SymbolStore for MemorySymbolStore {
    async fn load(&self, symbol: &str) -> Result<StoredSymbolState> {
        let states = self.states.lock().map_err(|_| "symbol store lock poisoned")?;
        Ok(states.get(symbol).cloned().unwrap_or_default())
    }

    async fn save(&self, symbol: &str, state: &StoredSymbolState) -> Result<()> {
        let mut states = self.states.lock().map_err(|_| "symbol store lock poisoned")?;
        states.insert(symbol.to_string(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_symbol_loads_flat() {
        let store = MemorySymbolStore::new();
        let state = store.load("NOPE").await.unwrap();

        assert_eq!(state, StoredSymbolState::default());
        assert!(!state.config.has_position);
    }

    #[test]
    fn test_state_json_tolerates_missing_sections() {
        let json = r#"{ "config": { "has_position": true, "trade_mode": "MODE_4H" } }"#;
        let state: StoredSymbolState = serde_json::from_str(json).unwrap();

        assert!(state.config.has_position);
        assert_eq!(state.config.avg_entry_price, None);
        assert_eq!(state.extrema, ExtremaState::default());
        assert_eq!(state.pending, PendingAggregates::default());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_connection_timeout() {
        let result = RedisSymbolStore::new("redis://192.0.2.1:6379").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_redis_round_trip() {
        let store = RedisSymbolStore::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");

        let mut state = StoredSymbolState::default();
        state.config.has_position = true;
        state.config.avg_entry_price = Some(42.5);
        state.extrema.top_1h = Some(44.0);

        store.save("TEST_ROUND_TRIP", &state).await.unwrap();
        let loaded = store.load("TEST_ROUND_TRIP").await.unwrap();

        assert_eq!(loaded, state);
    }
}
