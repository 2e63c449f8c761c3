//! Harvester configuration

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment-driven configuration. Every field is required; a missing
/// key is a startup-fatal error.
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// ARN of the cluster whose services are harvested.
    pub cluster_arn: String,
    /// Log group receiving the day-partitioned activity streams.
    pub log_group: String,
    /// Table holding per-service checkpoints.
    pub checkpoint_table: String,
    /// Base URL of the control-plane gateway.
    pub gateway_endpoint: String,
}

impl HarvesterConfig {
    /// Load configuration from `HARVESTER_`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("HARVESTER"))
            .build()
            .context("failed to read environment configuration")?;

        config.try_deserialize().context(
            "missing required configuration; set HARVESTER_CLUSTER_ARN, \
             HARVESTER_LOG_GROUP, HARVESTER_CHECKPOINT_TABLE and \
             HARVESTER_GATEWAY_ENDPOINT",
        )
    }

    /// Cluster name, the final path segment of the cluster ARN.
    pub fn cluster_name(&self) -> &str {
        self.cluster_arn
            .rsplit('/')
            .next()
            .unwrap_or(&self.cluster_arn)
    }
}
