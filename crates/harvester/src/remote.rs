//! Gateway implementations of the collaborator traits
//!
//! One JSON client over the cluster control-plane gateway backs all
//! four collaborators. Transport failures surface as plain errors for
//! the orchestrator to classify; the only expected non-2xx status is
//! the 409 returned for an already-existing log stream.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use harvester_lib::{
    async_trait, ActivitySource, Checkpoint, CheckpointStore, LogEvent, LogSink, Page,
    ScalingActivity, Service, ServiceDirectory, StreamCreation,
};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::HarvesterConfig;

/// Page size for service listings.
const SERVICE_PAGE_SIZE: u32 = 10;
/// Page size for scaling-activity listings.
const ACTIVITY_PAGE_SIZE: u32 = 50;

/// JSON client for the control-plane gateway, implementing every
/// collaborator trait the harvest pipeline consumes.
pub struct GatewayClient {
    client: Client,
    base_url: Url,
    cluster_name: String,
    log_group: String,
    checkpoint_table: String,
}

impl GatewayClient {
    pub fn new(config: &HarvesterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;

        let base_url =
            Url::parse(&config.gateway_endpoint).context("invalid gateway endpoint")?;

        Ok(Self {
            client,
            base_url,
            cluster_name: config.cluster_name().to_string(),
            log_group: config.log_group.clone(),
            checkpoint_table: config.checkpoint_table.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("invalid request path")
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context("failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("gateway error ({}): {}", status, body);
        }

        response.json().await.context("failed to parse gateway response")
    }

    async fn send_json<B: Serialize>(
        &self,
        request: reqwest::RequestBuilder,
        body: &B,
    ) -> Result<reqwest::Response> {
        let response = request
            .json(body)
            .send()
            .await
            .context("failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("gateway error ({}): {}", status, body);
        }

        Ok(response)
    }
}

// Wire types, snake_case JSON.

#[derive(Debug, Deserialize)]
struct ServiceListPage {
    service_refs: Vec<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct DescribeRequest<'a> {
    service_refs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    services: Vec<ServiceDetail>,
}

#[derive(Debug, Deserialize)]
struct ServiceDetail {
    service_name: String,
}

#[derive(Debug, Deserialize)]
struct ActivityPage {
    scaling_activities: Vec<ScalingActivity>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateStreamRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct AppendEventsRequest<'a> {
    events: &'a [LogEvent],
}

#[derive(Debug, Deserialize)]
struct CheckpointPage {
    records: Vec<Checkpoint>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    last_activity_id: Option<&'a str>,
    last_seen_at: DateTime<Utc>,
}

#[async_trait]
impl ServiceDirectory for GatewayClient {
    async fn list_services(&self, page_token: Option<String>) -> Result<Page<String>> {
        let path = format!("clusters/{}/services", self.cluster_name);
        let mut query = vec![
            ("max_results", SERVICE_PAGE_SIZE.to_string()),
            ("launch_type", "FARGATE".to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }

        let page: ServiceListPage = self.get_json(&path, &query).await?;
        Ok(Page {
            items: page.service_refs,
            next_token: page.next_page_token,
        })
    }

    async fn describe_services(&self, service_refs: &[String]) -> Result<Vec<Service>> {
        let path = format!("clusters/{}/services/describe", self.cluster_name);
        let url = self.url(&path)?;
        let response = self
            .send_json(self.client.post(url), &DescribeRequest { service_refs })
            .await?;
        let described: DescribeResponse = response
            .json()
            .await
            .context("failed to parse gateway response")?;

        Ok(described
            .services
            .into_iter()
            .map(|detail| Service {
                resource_id: format!(
                    "service/{}/{}",
                    self.cluster_name, detail.service_name
                ),
                name: detail.service_name,
            })
            .collect())
    }
}

#[async_trait]
impl ActivitySource for GatewayClient {
    async fn list_activities(
        &self,
        resource_id: &str,
        page_token: Option<String>,
    ) -> Result<Page<ScalingActivity>> {
        let mut query = vec![
            ("resource_id", resource_id.to_string()),
            ("max_results", ACTIVITY_PAGE_SIZE.to_string()),
            ("include_not_scaled", "true".to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }

        let page: ActivityPage = self.get_json("scaling-activities", &query).await?;
        Ok(Page {
            items: page.scaling_activities,
            next_token: page.next_page_token,
        })
    }
}

#[async_trait]
impl LogSink for GatewayClient {
    async fn create_stream(&self, name: &str) -> Result<StreamCreation> {
        let path = format!("log-groups/{}/streams", self.log_group);
        let url = self.url(&path)?;
        let response = self
            .client
            .post(url)
            .json(&CreateStreamRequest { name })
            .send()
            .await
            .context("failed to send request")?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(StreamCreation::AlreadyExists);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("gateway error ({}): {}", status, body);
        }
        Ok(StreamCreation::Created)
    }

    async fn append_events(&self, stream: &str, events: &[LogEvent]) -> Result<()> {
        let path = format!("log-groups/{}/streams/{}/events", self.log_group, stream);
        let url = self.url(&path)?;
        self.send_json(self.client.post(url), &AppendEventsRequest { events })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for GatewayClient {
    async fn scan(&self, page_token: Option<String>) -> Result<Page<Checkpoint>> {
        let path = format!("checkpoint-tables/{}/records", self.checkpoint_table);
        let mut query = Vec::new();
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }

        let page: CheckpointPage = self.get_json(&path, &query).await?;
        Ok(Page {
            items: page.records,
            next_token: page.next_page_token,
        })
    }

    async fn upsert(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = format!(
            "checkpoint-tables/{}/records/{}",
            self.checkpoint_table, checkpoint.service_name
        );
        let url = self.url(&path)?;
        let body = UpsertRequest {
            last_activity_id: checkpoint.last_activity_id.as_deref(),
            last_seen_at: checkpoint.last_seen_at,
        };
        self.send_json(self.client.put(url), &body).await?;
        Ok(())
    }
}
