//! Core library for the scaling activity harvester
//!
//! This crate provides the incremental harvest pipeline:
//! - Pagination cursor driver for token-paged collaborator listings
//! - Checkpoint repository with staged, end-of-run commits
//! - Per-service activity harvesting with window and checkpoint stops
//! - Day-bucketed publishing to a time-partitioned log sink
//! - Orchestration of one full harvest cycle
//!
//! The four external collaborators (service directory, activity source,
//! log sink, checkpoint store) are traits; the binary crate supplies
//! the wire implementations.

pub mod checkpoint;
pub mod directory;
pub mod error;
pub mod harvest;
pub mod models;
pub mod orchestrator;
pub mod page;
pub mod publish;

pub use async_trait::async_trait;

pub use checkpoint::{CheckpointRepository, CheckpointStore};
pub use directory::{enumerate_services, ServiceDirectory};
pub use error::HarvestError;
pub use harvest::{harvest_service, ActivitySource, HarvestOutcome, RETENTION_DAYS};
pub use models::{Checkpoint, LogEvent, ScalingActivity, Service};
pub use orchestrator::{Orchestrator, RunSummary};
pub use page::{fetch_all, Page};
pub use publish::{publish_all, LogSink, PublishReport, StreamCreation};
