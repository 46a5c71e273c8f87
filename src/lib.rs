// Core modules
pub mod aggregator;
pub mod audit;
pub mod engine;
pub mod entry;
pub mod error;
pub mod exit;
pub mod indicators;
pub mod mode;
pub mod models;
pub mod persistence;
pub mod regime;
pub mod settings;
pub mod signals;
pub mod stoploss;

// Re-export commonly used types
pub use engine::{CycleInput, CycleOutcome, DecisionEngine};
pub use error::{EngineError, EngineResult};
pub use models::*;
pub use persistence::{MemorySymbolStore, RedisSymbolStore, StoredSymbolState, SymbolStore};
pub use settings::{load_engine_config, EngineConfig};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
