//! Checkpoint repository with staged, end-of-run commits
//!
//! Checkpoints are read in one bulk scan at harvest start, updated in
//! memory while services are harvested, and written back only after the
//! publisher has confirmed every new activity. Nothing touches the
//! durable store before that point, so an aborted run leaves the
//! previous markers intact and the next run re-covers the same range.

use crate::error::HarvestError;
use crate::models::Checkpoint;
use crate::page::{fetch_all, Page};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Durable store holding one checkpoint record per service.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Scan one page of checkpoint records.
    async fn scan(&self, page_token: Option<String>) -> Result<Page<Checkpoint>>;

    /// Insert or replace the record keyed by `checkpoint.service_name`.
    async fn upsert(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// In-memory view of the checkpoint store for one harvest cycle.
pub struct CheckpointRepository {
    store: Arc<dyn CheckpointStore>,
    loaded: HashMap<String, Checkpoint>,
    staged: BTreeMap<String, Checkpoint>,
}

impl std::fmt::Debug for CheckpointRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointRepository")
            .field("loaded", &self.loaded)
            .field("staged", &self.staged)
            .finish_non_exhaustive()
    }
}

impl CheckpointRepository {
    /// Bulk-loads every known checkpoint, paging through the store.
    pub async fn load(store: Arc<dyn CheckpointStore>) -> Result<Self, HarvestError> {
        let records = fetch_all(|token| store.scan(token))
            .await
            .map_err(|source| HarvestError::StoreUnavailable { source })?;
        debug!(checkpoints = records.len(), "loaded checkpoints");

        let loaded = records
            .into_iter()
            .map(|record| (record.service_name.clone(), record))
            .collect();

        Ok(Self {
            store,
            loaded,
            staged: BTreeMap::new(),
        })
    }

    /// Last committed checkpoint for a service, if it was ever harvested.
    pub fn get(&self, service_name: &str) -> Option<&Checkpoint> {
        self.loaded.get(service_name)
    }

    /// Records an intended update without writing through. Restaging a
    /// service replaces its previously staged value.
    pub fn stage(&mut self, checkpoint: Checkpoint) {
        self.staged
            .insert(checkpoint.service_name.clone(), checkpoint);
    }

    /// Number of checkpoints currently staged.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Upserts every staged checkpoint, each write independent.
    ///
    /// Writes that already landed are not rolled back on a later
    /// failure; the failed services are reported and re-harvest the
    /// published range on the next run.
    pub async fn commit_all(&mut self) -> Result<usize, HarvestError> {
        let mut failed_services = Vec::new();
        let mut committed = 0;

        for (service_name, checkpoint) in &self.staged {
            match self.store.upsert(checkpoint).await {
                Ok(()) => committed += 1,
                Err(error) => {
                    warn!(service = %service_name, error = %error, "checkpoint upsert failed");
                    failed_services.push(service_name.clone());
                }
            }
        }

        if failed_services.is_empty() {
            self.staged.clear();
            Ok(committed)
        } else {
            Err(HarvestError::PartialCommitFailure { failed_services })
        }
    }
}
