//! Day-bucketed publishing to the log sink
//!
//! New activities from every service are sorted chronologically,
//! partitioned by UTC calendar day, and each day is appended to its own
//! log stream in a single call. The sink requires non-decreasing event
//! timestamps within one append, so each day group is sorted again on
//! the derived epoch-millisecond value before writing.

use crate::error::HarvestError;
use crate::models::{LogEvent, ScalingActivity};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info};

/// Outcome of a stream-creation attempt. An existing stream is an
/// expected condition, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCreation {
    Created,
    AlreadyExists,
}

/// Time-partitioned durable log destination.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Create a log stream with the given name.
    async fn create_stream(&self, name: &str) -> Result<StreamCreation>;

    /// Append events to a stream. `events` must be sorted by ascending
    /// timestamp.
    async fn append_events(&self, stream: &str, events: &[LogEvent]) -> Result<()>;
}

/// What a publish pass wrote.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub days: usize,
    pub events: usize,
}

/// Publishes the full cross-service activity set, one atomic append per
/// UTC calendar day.
///
/// The first day group that fails aborts the remaining groups; days
/// already appended stay written. The caller must not commit any
/// checkpoint unless this returns `Ok`.
pub async fn publish_all(
    sink: &dyn LogSink,
    mut activities: Vec<ScalingActivity>,
) -> Result<PublishReport, HarvestError> {
    // Stable sort places same-day activities contiguously.
    activities.sort_by_key(|a| a.start_time);

    let mut report = PublishReport::default();
    let mut start = 0;
    while start < activities.len() {
        let day = activities[start].start_time.date_naive();
        let mut end = start + 1;
        while end < activities.len() && activities[end].start_time.date_naive() == day {
            end += 1;
        }

        let group = &activities[start..end];
        publish_day(sink, day, group).await?;
        report.days += 1;
        report.events += group.len();
        start = end;
    }

    info!(days = report.days, events = report.events, "published activities");
    Ok(report)
}

async fn publish_day(
    sink: &dyn LogSink,
    day: NaiveDate,
    group: &[ScalingActivity],
) -> Result<(), HarvestError> {
    let mut events = group
        .iter()
        .map(LogEvent::from_activity)
        .collect::<Result<Vec<_>>>()
        .map_err(|source| HarvestError::PublishFailure { day, source })?;
    events.sort_by_key(|e| e.timestamp);

    let stream = day.to_string();
    match sink.create_stream(&stream).await {
        Ok(StreamCreation::Created) => {}
        Ok(StreamCreation::AlreadyExists) => {
            debug!(stream = %stream, "log stream already exists");
        }
        Err(source) => return Err(HarvestError::PublishFailure { day, source }),
    }

    sink.append_events(&stream, &events)
        .await
        .map_err(|source| HarvestError::PublishFailure { day, source })?;

    debug!(stream = %stream, events = events.len(), "appended day group");
    Ok(())
}
