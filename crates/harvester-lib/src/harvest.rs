//! Per-service incremental activity harvesting
//!
//! Walks a service's scaling activities in the source's native
//! newest-first order and collects everything not yet processed. Two
//! expected stop conditions bound the scan: the 14-day retention window
//! and the service's checkpointed activity id. Both are common
//! outcomes, handled with plain control flow.

use crate::models::{Checkpoint, ScalingActivity, Service};
use crate::page::Page;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Activities older than this many days are unreachable.
pub const RETENTION_DAYS: i64 = 14;

/// Source of scaling activities for the cluster's services.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// List one page of activities for a resource, newest first.
    async fn list_activities(
        &self,
        resource_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<ScalingActivity>>;
}

/// Result of harvesting one service.
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    /// New activities, newest first. Possibly empty.
    pub new_activities: Vec<ScalingActivity>,
    /// Proposed checkpoint for the service: the newest collected
    /// activity when anything was found, the prior checkpoint when not,
    /// or a baseline at `now` for a never-harvested quiet service.
    pub checkpoint: Checkpoint,
}

/// Scans a service's activity history and returns everything strictly
/// newer than its checkpoint, bounded by the retention window.
///
/// The window predicate is evaluated before the identity match: with a
/// newest-first ordering, the first out-of-window activity makes every
/// remaining item unreachable, including a checkpointed activity that
/// has aged out.
pub async fn harvest_service(
    source: &dyn ActivitySource,
    service: &Service,
    prior: Option<&Checkpoint>,
    now: DateTime<Utc>,
) -> Result<HarvestOutcome> {
    let window = Duration::days(RETENTION_DAYS);
    let mut collected: Vec<ScalingActivity> = Vec::new();
    let mut token: Option<String> = None;

    'pages: loop {
        let page = source.list_activities(&service.resource_id, token).await?;

        for activity in page.items {
            if now - activity.start_time >= window {
                break 'pages;
            }
            if let Some(prior) = prior {
                if prior.last_activity_id.as_deref() == Some(activity.activity_id.as_str()) {
                    break 'pages;
                }
            }
            collected.push(activity);
        }

        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    let checkpoint = match collected.first() {
        Some(newest) => Checkpoint {
            service_name: service.name.clone(),
            last_activity_id: Some(newest.activity_id.clone()),
            last_seen_at: newest.start_time,
        },
        None => match prior {
            Some(existing) => existing.clone(),
            None => Checkpoint::baseline(service.name.clone(), now),
        },
    };

    debug!(
        service = %service.name,
        new_activities = collected.len(),
        "harvested service"
    );

    Ok(HarvestOutcome {
        new_activities: collected,
        checkpoint,
    })
}
