//! Vigil alerting engine
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - VIGIL_RULES_PATH: JSON array of alert rules (default: rules.json)
//! - VIGIL_SERIES_PATH: JSON object of series values keyed by query ref (optional)
//! - RUST_LOG: Log level (default: info)
//!
//! Engine tuning (see `EngineConfig::from_env`):
//! - VIGIL_JOB_QUEUE_CAPACITY, VIGIL_RESULT_QUEUE_CAPACITY
//! - VIGIL_EXECUTION_TIMEOUT_SECS, VIGIL_MAX_RETRIES
//! - VIGIL_RULE_REFRESH_TICKS, VIGIL_TICK_INTERVAL_MS, VIGIL_TICK_OFFSET_MS
//! - VIGIL_DISPATCH_WORKERS, VIGIL_ABORT_TIMED_OUT

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil::alerting::{Engine, FileRuleSource, LogStateSink, StaticSeriesSource, ThresholdExecutor};
use vigil::EngineConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    let rules_path = std::env::var("VIGIL_RULES_PATH").unwrap_or_else(|_| "rules.json".to_string());

    let series = match std::env::var("VIGIL_SERIES_PATH") {
        Ok(path) => {
            tracing::info!("  Series: {}", path);
            StaticSeriesSource::load(&path)?
        }
        Err(_) => StaticSeriesSource::new(),
    };

    tracing::info!("Vigil configuration:");
    tracing::info!("  Rules: {}", rules_path);
    tracing::info!("  Tick interval: {:?}", config.tick_interval);
    tracing::info!("  Execution timeout: {:?}", config.execution_timeout);
    tracing::info!("  Max retries: {}", config.max_retries);
    tracing::info!(
        "  Queue capacity: {} jobs / {} results",
        config.job_queue_capacity,
        config.result_queue_capacity
    );
    tracing::info!("  Dispatch workers: {}", config.dispatch_workers);

    let mut engine = Engine::new(
        config,
        Arc::new(FileRuleSource::new(rules_path)),
        Arc::new(ThresholdExecutor::new(Arc::new(series))),
        Arc::new(LogStateSink),
    );
    engine.start()?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping engine...");
    engine.stop().await;

    Ok(())
}
