use anyhow::Context;
use clap::Parser;
use mtfbot::models::Candle;
use mtfbot::{
    load_engine_config, CycleInput, DecisionEngine, MemorySymbolStore, RedisSymbolStore, StoredSymbolConfig,
    StoredSymbolState, SymbolStore,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Run one multi-timeframe decision cycle for a symbol
#[derive(Debug, Parser)]
#[command(name = "mtfbot", version, about)]
struct Args {
    /// Symbol to evaluate
    #[arg(long)]
    symbol: String,

    /// JSON file holding an array of closed 1h candles, oldest first
    #[arg(long)]
    candles: PathBuf,

    /// Engine config file (toml/json/yaml); MTF__* env vars override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load and persist symbol state in Redis
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Seed an open position (in-memory state only)
    #[arg(long)]
    has_position: bool,

    #[arg(long, requires = "has_position")]
    avg_entry_price: Option<f64>,

    #[arg(long, requires = "has_position")]
    trade_mode: Option<String>,

    /// Print the outcome without saving state
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();

    let config = load_engine_config(args.config.as_deref()).context("Failed to load engine config")?;
    let engine = DecisionEngine::new(config);

    let raw = std::fs::read_to_string(&args.candles)
        .with_context(|| format!("Failed to read candles from {}", args.candles.display()))?;
    let hourly: Vec<Candle> = serde_json::from_str(&raw).context("Failed to parse candle JSON")?;

    tracing::info!("🚀 mtfbot: {} with {} hourly candles", args.symbol, hourly.len());

    match args.redis_url.as_deref() {
        Some(url) => {
            let store = RedisSymbolStore::new(url)
                .await
                .map_err(|e| anyhow::anyhow!("Redis unavailable: {}", e))?;
            run_cycle(&engine, &store, &args, hourly).await
        }
        None => {
            let seeded = StoredSymbolState {
                config: StoredSymbolConfig {
                    has_position: args.has_position,
                    avg_entry_price: args.avg_entry_price,
                    trade_mode: args.trade_mode.clone(),
                },
                ..StoredSymbolState::default()
            };
            let store = MemorySymbolStore::with_state(&args.symbol, seeded);
            run_cycle(&engine, &store, &args, hourly).await
        }
    }
}

async fn run_cycle<S: SymbolStore>(
    engine: &DecisionEngine,
    store: &S,
    args: &Args,
    hourly: Vec<Candle>,
) -> anyhow::Result<()> {
    let stored = store
        .load(&args.symbol)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load state for {}: {}", args.symbol, e))?;

    let outcome = engine
        .evaluate(CycleInput {
            symbol: args.symbol.clone(),
            hourly,
            stored,
            as_of: None,
        })
        .with_context(|| format!("Cycle failed for {}", args.symbol))?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if args.dry_run {
        tracing::info!("Dry run, state not saved");
        return Ok(());
    }

    store
        .save(&args.symbol, &outcome.into_stored())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to save state for {}: {}", args.symbol, e))?;

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mtfbot=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
