//! Harvest orchestration
//!
//! One run enumerates the cluster's services, harvests each against its
//! checkpoint, publishes the aggregate day-by-day, and only then
//! commits the staged checkpoints. A failure anywhere before the commit
//! leaves the durable markers untouched, so the next scheduled run
//! re-covers the same window.

use crate::checkpoint::{CheckpointRepository, CheckpointStore};
use crate::directory::{enumerate_services, ServiceDirectory};
use crate::error::HarvestError;
use crate::harvest::{harvest_service, ActivitySource};
use crate::models::ScalingActivity;
use crate::publish::{publish_all, LogSink};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Counters for one completed harvest run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub services: usize,
    pub new_activities: usize,
    pub days_published: usize,
    pub checkpoints_committed: usize,
}

/// Drives one full harvest cycle over the four collaborators.
pub struct Orchestrator {
    directory: Arc<dyn ServiceDirectory>,
    source: Arc<dyn ActivitySource>,
    sink: Arc<dyn LogSink>,
    store: Arc<dyn CheckpointStore>,
}

impl Orchestrator {
    pub fn new(
        directory: Arc<dyn ServiceDirectory>,
        source: Arc<dyn ActivitySource>,
        sink: Arc<dyn LogSink>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            directory,
            source,
            sink,
            store,
        }
    }

    /// Runs one harvest cycle against the wall-clock reference `now`.
    ///
    /// An idle cycle (no new activity anywhere) skips both the publish
    /// and the checkpoint commit; re-running is a cheap no-op.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary, HarvestError> {
        let services = enumerate_services(self.directory.as_ref())
            .await
            .map_err(|source| HarvestError::CollaboratorUnavailable { source })?;
        info!(services = services.len(), "enumerated cluster services");

        let mut repository = CheckpointRepository::load(Arc::clone(&self.store)).await?;

        let mut harvested: Vec<ScalingActivity> = Vec::new();
        for service in &services {
            let prior = repository.get(&service.name).cloned();
            let outcome = harvest_service(self.source.as_ref(), service, prior.as_ref(), now)
                .await
                .map_err(|source| HarvestError::CollaboratorUnavailable { source })?;
            harvested.extend(outcome.new_activities);
            repository.stage(outcome.checkpoint);
        }

        let new_activities = harvested.len();
        if harvested.is_empty() {
            info!("no new scaling activity; skipping publish and commit");
            return Ok(RunSummary {
                services: services.len(),
                ..RunSummary::default()
            });
        }

        let report = publish_all(self.sink.as_ref(), harvested).await?;
        let checkpoints_committed = repository.commit_all().await?;

        info!(
            new_activities,
            days_published = report.days,
            checkpoints_committed,
            "harvest run complete"
        );

        Ok(RunSummary {
            services: services.len(),
            new_activities,
            days_published: report.days,
            checkpoints_committed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Checkpoint, LogEvent, Service};
    use crate::page::Page;
    use crate::publish::StreamCreation;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Directory serving a fixed service list, one ref per page.
    struct FakeDirectory {
        names: Vec<String>,
    }

    #[async_trait]
    impl ServiceDirectory for FakeDirectory {
        async fn list_services(&self, page_token: Option<String>) -> Result<Page<String>> {
            let offset: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            let next_token = (offset + 1 < self.names.len()).then(|| (offset + 1).to_string());
            Ok(Page {
                items: self.names.get(offset).cloned().into_iter().collect(),
                next_token,
            })
        }

        async fn describe_services(&self, service_refs: &[String]) -> Result<Vec<Service>> {
            Ok(service_refs
                .iter()
                .map(|name| Service {
                    name: name.clone(),
                    resource_id: format!("service/test-cluster/{name}"),
                })
                .collect())
        }
    }

    /// Source with a fixed newest-first history per resource.
    struct FakeSource {
        activities: HashMap<String, Vec<ScalingActivity>>,
        list_calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(activities: HashMap<String, Vec<ScalingActivity>>) -> Self {
            Self {
                activities,
                list_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ActivitySource for FakeSource {
        async fn list_activities(
            &self,
            resource_id: &str,
            _page_token: Option<String>,
        ) -> Result<Page<ScalingActivity>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Page::last(
                self.activities.get(resource_id).cloned().unwrap_or_default(),
            ))
        }
    }

    struct FakeSink {
        appends: Mutex<Vec<(String, Vec<LogEvent>)>>,
        fail_appends_to: Option<String>,
    }

    impl FakeSink {
        fn new() -> Self {
            Self {
                appends: Mutex::new(Vec::new()),
                fail_appends_to: None,
            }
        }
    }

    #[async_trait]
    impl LogSink for FakeSink {
        async fn create_stream(&self, _name: &str) -> Result<StreamCreation> {
            Ok(StreamCreation::Created)
        }

        async fn append_events(&self, stream: &str, events: &[LogEvent]) -> Result<()> {
            if self.fail_appends_to.as_deref() == Some(stream) {
                return Err(anyhow!("append rejected"));
            }
            self.appends
                .lock()
                .unwrap()
                .push((stream.to_string(), events.to_vec()));
            Ok(())
        }
    }

    /// Store whose scans reflect earlier upserts, like the real thing.
    struct FakeStore {
        records: Mutex<HashMap<String, Checkpoint>>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl CheckpointStore for FakeStore {
        async fn scan(&self, _page_token: Option<String>) -> Result<Page<Checkpoint>> {
            Ok(Page::last(
                self.records.lock().unwrap().values().cloned().collect(),
            ))
        }

        async fn upsert(&self, checkpoint: &Checkpoint) -> Result<()> {
            self.records
                .lock()
                .unwrap()
                .insert(checkpoint.service_name.clone(), checkpoint.clone());
            Ok(())
        }
    }

    fn activity(service: &str, id: &str, age_hours: i64, now: DateTime<Utc>) -> ScalingActivity {
        ScalingActivity {
            activity_id: id.to_string(),
            service_name: service.to_string(),
            start_time: now - Duration::hours(age_hours),
            details: json!({"cause": "scale out"}),
        }
    }

    fn orchestrator(
        directory: Arc<FakeDirectory>,
        source: Arc<FakeSource>,
        sink: Arc<FakeSink>,
        store: Arc<FakeStore>,
    ) -> Orchestrator {
        Orchestrator::new(directory, source, sink, store)
    }

    #[tokio::test]
    async fn harvests_every_service_from_a_paginated_directory() {
        let now = Utc::now();
        let directory = Arc::new(FakeDirectory {
            names: vec!["orders".into(), "billing".into(), "search".into()],
        });
        let mut activities = HashMap::new();
        for name in ["orders", "billing", "search"] {
            activities.insert(
                format!("service/test-cluster/{name}"),
                vec![activity(name, &format!("{name}-a1"), 1, now)],
            );
        }
        let source = Arc::new(FakeSource::new(activities));
        let sink = Arc::new(FakeSink::new());
        let store = Arc::new(FakeStore::new());

        let summary = orchestrator(directory, source.clone(), sink.clone(), store.clone())
            .run(now)
            .await
            .unwrap();

        assert_eq!(summary.services, 3);
        assert_eq!(summary.new_activities, 3);
        assert_eq!(summary.checkpoints_committed, 3);
        // One listing per service: each harvested exactly once.
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 3);

        let records = store.records.lock().unwrap();
        assert_eq!(
            records["orders"].last_activity_id.as_deref(),
            Some("orders-a1")
        );
    }

    #[tokio::test]
    async fn committed_checkpoint_tracks_newest_activity() {
        let now = Utc::now();
        let directory = Arc::new(FakeDirectory {
            names: vec!["orders".into()],
        });
        let mut activities = HashMap::new();
        activities.insert(
            "service/test-cluster/orders".to_string(),
            vec![
                activity("orders", "a9", 1, now),
                activity("orders", "a8", 2, now),
                activity("orders", "a7", 3, now),
            ],
        );
        let source = Arc::new(FakeSource::new(activities));
        let sink = Arc::new(FakeSink::new());
        let store = Arc::new(FakeStore::new());

        orchestrator(directory, source, sink, store.clone())
            .run(now)
            .await
            .unwrap();

        let records = store.records.lock().unwrap();
        let checkpoint = &records["orders"];
        assert_eq!(checkpoint.last_activity_id.as_deref(), Some("a9"));
        assert_eq!(checkpoint.last_seen_at, now - Duration::hours(1));
    }

    #[tokio::test]
    async fn second_run_with_no_new_activity_is_a_no_op() {
        let now = Utc::now();
        let directory = Arc::new(FakeDirectory {
            names: vec!["orders".into()],
        });
        let mut activities = HashMap::new();
        activities.insert(
            "service/test-cluster/orders".to_string(),
            vec![
                activity("orders", "a2", 1, now),
                activity("orders", "a1", 2, now),
            ],
        );
        let source = Arc::new(FakeSource::new(activities));
        let sink = Arc::new(FakeSink::new());
        let store = Arc::new(FakeStore::new());

        let first = orchestrator(
            directory.clone(),
            source.clone(),
            sink.clone(),
            store.clone(),
        )
        .run(now)
        .await
        .unwrap();
        assert_eq!(first.new_activities, 2);
        let checkpoint_after_first = store.records.lock().unwrap()["orders"].clone();

        let second = orchestrator(directory, source, sink.clone(), store.clone())
            .run(now)
            .await
            .unwrap();

        assert_eq!(second.new_activities, 0);
        assert_eq!(second.days_published, 0);
        assert_eq!(second.checkpoints_committed, 0);
        // No duplicate events were appended on the second run.
        assert_eq!(sink.appends.lock().unwrap().len(), first.days_published);
        // Checkpoints identical after each run.
        assert_eq!(
            store.records.lock().unwrap()["orders"],
            checkpoint_after_first
        );
    }

    #[tokio::test]
    async fn publish_failure_commits_no_checkpoints() {
        // Pinned mid-day so the two activities land on different UTC days.
        let now = DateTime::<Utc>::from_timestamp(1_700_049_600, 0).unwrap();
        let directory = Arc::new(FakeDirectory {
            names: vec!["orders".into()],
        });
        let yesterday_stream = (now - Duration::days(1)).date_naive().to_string();
        let mut activities = HashMap::new();
        activities.insert(
            "service/test-cluster/orders".to_string(),
            vec![
                activity("orders", "a2", 1, now),
                activity("orders", "a1", 25, now),
            ],
        );
        let source = Arc::new(FakeSource::new(activities));
        // Today's group fails; yesterday's group lands first.
        let sink = Arc::new(FakeSink {
            fail_appends_to: Some(now.date_naive().to_string()),
            appends: Mutex::new(Vec::new()),
        });
        let store = Arc::new(FakeStore::new());

        let error = orchestrator(directory, source, sink.clone(), store.clone())
            .run(now)
            .await
            .unwrap_err();

        assert!(matches!(error, HarvestError::PublishFailure { .. }));
        let appends = sink.appends.lock().unwrap();
        assert_eq!(appends.len(), 1);
        assert_eq!(appends[0].0, yesterday_stream);
        // Nothing committed: the next run re-discovers both activities.
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn idle_run_touches_neither_sink_nor_store() {
        let now = Utc::now();
        let directory = Arc::new(FakeDirectory {
            names: vec!["orders".into()],
        });
        let source = Arc::new(FakeSource::new(HashMap::new()));
        let sink = Arc::new(FakeSink::new());
        let store = Arc::new(FakeStore::new());

        let summary = orchestrator(directory, source, sink.clone(), store.clone())
            .run(now)
            .await
            .unwrap();

        assert_eq!(summary.services, 1);
        assert_eq!(summary.new_activities, 0);
        assert!(sink.appends.lock().unwrap().is_empty());
        // Even the baseline checkpoint waits for a run that publishes.
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn directory_failure_aborts_the_run() {
        struct DownDirectory;

        #[async_trait]
        impl ServiceDirectory for DownDirectory {
            async fn list_services(&self, _page_token: Option<String>) -> Result<Page<String>> {
                Err(anyhow!("directory unreachable"))
            }

            async fn describe_services(&self, _service_refs: &[String]) -> Result<Vec<Service>> {
                unreachable!("listing failed first")
            }
        }

        let error = Orchestrator::new(
            Arc::new(DownDirectory),
            Arc::new(FakeSource::new(HashMap::new())),
            Arc::new(FakeSink::new()),
            Arc::new(FakeStore::new()),
        )
        .run(Utc::now())
        .await
        .unwrap_err();

        assert!(matches!(error, HarvestError::CollaboratorUnavailable { .. }));
    }
}
