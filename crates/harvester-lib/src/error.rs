//! Error taxonomy for a harvest run
//!
//! Component errors are never retried here; they propagate to the
//! orchestrator, which halts forward progress without committing
//! checkpoints. Retry is the scheduler's concern: the pipeline is safe
//! to re-execute.

use chrono::NaiveDate;
use thiserror::Error;

/// Run-level failures surfaced by the harvest pipeline.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// A collaborator (service directory or activity source) could not
    /// be reached or returned a transport-level failure.
    #[error("collaborator unavailable: {source}")]
    CollaboratorUnavailable {
        #[source]
        source: anyhow::Error,
    },

    /// The checkpoint store could not be scanned at harvest start.
    #[error("checkpoint store unavailable: {source}")]
    StoreUnavailable {
        #[source]
        source: anyhow::Error,
    },

    /// A day group failed to publish. Earlier day groups may already be
    /// written; no checkpoint has been committed.
    #[error("publish failed for day {day}: {source}")]
    PublishFailure {
        day: NaiveDate,
        #[source]
        source: anyhow::Error,
    },

    /// Some checkpoint upserts failed after a successful publish. The
    /// named services re-harvest the already-published range next run.
    #[error("checkpoint commit failed for {} service(s): {}", failed_services.len(), failed_services.join(", "))]
    PartialCommitFailure { failed_services: Vec<String> },
}
