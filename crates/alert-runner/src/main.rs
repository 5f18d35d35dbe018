//! KPI alert runner
//!
//! Batch binary that scores configured metrics against the warehouse,
//! persists confirmed anomalies, and attributes each one to its dimension
//! drivers. Intended to be triggered by an external scheduler; one
//! invocation is one run.

use std::sync::Arc;

use alerting_lib::pipeline::{AlertPipeline, PipelineConfig};
use alerting_lib::rules::RuleSet;
use alerting_lib::store::{PgWarehouse, WarehouseTables};
use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting alert runner");

    let config = config::RunnerConfig::load()?;

    // A broken rule set aborts here, before any warehouse I/O.
    let rules = RuleSet::load(&config.rules_path)?;
    info!(rules = rules.len(), path = %config.rules_path, "Rules loaded");

    let warehouse = Arc::new(
        PgWarehouse::connect(&config.database_url, WarehouseTables::default()).await?,
    );

    let pipeline_config = PipelineConfig {
        lookback_days: config.lookback_days,
        ..PipelineConfig::default()
    };
    let pipeline = AlertPipeline::new(
        warehouse.clone(),
        warehouse.clone(),
        warehouse.clone(),
        warehouse,
        pipeline_config,
    );

    let summary = pipeline.run(&rules).await?;
    info!(
        rules_evaluated = summary.rules_evaluated,
        metrics_skipped = summary.metrics_skipped,
        alerts_written = summary.alerts_written,
        drivers_written = summary.drivers_written,
        "Run complete"
    );

    Ok(())
}
