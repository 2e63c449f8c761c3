//! Scaling activity harvester entry point
//!
//! Performs one incremental harvest cycle: enumerates the cluster's
//! services, collects scaling activities newer than each service's
//! checkpoint, republishes them into day-partitioned log streams, and
//! advances the checkpoints. Scheduling is external; any failure exits
//! non-zero and the next run safely re-covers the window.

use anyhow::Result;
use chrono::Utc;
use harvester_lib::Orchestrator;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod remote;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting scaling-harvester");

    let config = config::HarvesterConfig::load()?;
    info!(
        cluster = %config.cluster_name(),
        log_group = %config.log_group,
        checkpoint_table = %config.checkpoint_table,
        "Harvester configured"
    );

    let gateway = Arc::new(remote::GatewayClient::new(&config)?);
    let orchestrator = Orchestrator::new(
        gateway.clone(),
        gateway.clone(),
        gateway.clone(),
        gateway,
    );

    let summary = orchestrator.run(Utc::now()).await?;
    info!(
        services = summary.services,
        new_activities = summary.new_activities,
        days_published = summary.days_published,
        checkpoints_committed = summary.checkpoints_committed,
        "Harvest run complete"
    );

    Ok(())
}
