//! Core data model for the scaling activity harvester

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One managed workload unit under the cluster.
///
/// Enumerated fresh from the service directory on every harvest cycle;
/// never persisted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Unique service name within the cluster.
    pub name: String,
    /// Cluster-scoped addressing string used to query the service's
    /// scaling activities, e.g. `service/{cluster}/{name}`.
    pub resource_id: String,
}

/// An immutable autoscaling event produced by the activity source.
///
/// Everything beyond the identifying fields is opaque payload carried
/// through to the log sink verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingActivity {
    /// Unique within one service's history, not globally.
    pub activity_id: String,
    pub service_name: String,
    /// Ordering key; serialized as an ISO-8601 string.
    pub start_time: DateTime<Utc>,
    #[serde(flatten)]
    pub details: serde_json::Value,
}

/// Durable per-service marker of the last processed activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub service_name: String,
    /// `None` means the service has never had an activity processed.
    pub last_activity_id: Option<String>,
    /// Start time of the last processed activity, or the harvest run
    /// time when establishing a baseline for a quiet service.
    pub last_seen_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Baseline for a service with no processed activity yet.
    pub fn baseline(service_name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            service_name: service_name.into(),
            last_activity_id: None,
            last_seen_at: at,
        }
    }
}

/// Projection of a [`ScalingActivity`] for the log sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Epoch milliseconds derived from the activity start time.
    pub timestamp: i64,
    /// The activity serialized as JSON, start time rendered ISO-8601.
    pub message: String,
}

impl LogEvent {
    pub fn from_activity(activity: &ScalingActivity) -> Result<Self> {
        Ok(Self {
            timestamp: activity.start_time.timestamp_millis(),
            message: serde_json::to_string(activity)?,
        })
    }
}
