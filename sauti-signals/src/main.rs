//! Sauti Signals - crisis detection and alerting service.

use anyhow::{Context, Result};
use sauti_common::config::Config;
use sauti_common::logging::init_logging;
use sauti_signals::SignalService;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    // Load configuration
    let config = Config::load_with_env()?;
    config.validate().context("Invalid configuration")?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Sauti Signals v{}", env!("CARGO_PKG_VERSION"));

    let service = SignalService::new(config)?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
