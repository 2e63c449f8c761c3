//! Service enumeration through the cluster's service directory

use crate::models::Service;
use crate::page::{fetch_all, Page};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Most service refs a single describe call accepts.
const DESCRIBE_BATCH: usize = 10;

/// Directory of managed services under the cluster.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// List one page of service refs.
    async fn list_services(&self, page_token: Option<String>) -> Result<Page<String>>;

    /// Resolve service refs into described services.
    async fn describe_services(&self, service_refs: &[String]) -> Result<Vec<Service>>;
}

/// Enumerates every service in the cluster: pages through the ref
/// listing, then describes the refs in batches of at most
/// [`DESCRIBE_BATCH`].
pub async fn enumerate_services(directory: &dyn ServiceDirectory) -> Result<Vec<Service>> {
    let refs = fetch_all(move |token| directory.list_services(token)).await?;
    debug!(refs = refs.len(), "listed service refs");

    let mut services = Vec::with_capacity(refs.len());
    for batch in refs.chunks(DESCRIBE_BATCH) {
        services.extend(directory.describe_services(batch).await?);
    }
    Ok(services)
}
