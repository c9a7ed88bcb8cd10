// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Fulcrum API client
//!
//! GET requests are retried with backoff; POSTs create runs or prompts and
//! are sent exactly once.

use crate::config::ClientConfig;
use crate::error::{detail_from_body, ClientError, Result};
use async_trait::async_trait;
use fulcrum_core::backend::{BackendResult, ReplayBackend};
use fulcrum_core::{
    compare_run_ids, BackendError, ChatRequest, ChatResponse, CompareRunsResponse,
    CreatePromptRequest, CreateVersionRequest, GuardrailPolicy, MetricsRange, MetricsSummary,
    PlaygroundRequest, PlaygroundResponse, Prompt, RunDetail, RunSnapshot, RunsQuery,
    RunsResponse, StagedReplayRequest, StagedReplayResponse,
};
use moka::future::Cache;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client as HttpClient, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "X-API-Key";

/// Async client for the replay, prompt, chat, runs and dashboard endpoints.
///
/// # Example
///
/// ```no_run
/// use fulcrum_client::{ClientConfig, FulcrumClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = FulcrumClient::new(ClientConfig::from_env())?;
///     let snapshot = client.fetch_run_stages("run_abc123").await?;
///     println!("{} ran on {}", snapshot.run_id, snapshot.model);
///     Ok(())
/// }
/// ```
pub struct FulcrumClient {
    config: ClientConfig,
    http_client: HttpClient,
    snapshots: Cache<String, RunSnapshot>,
}

impl FulcrumClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(ClientError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                config.base_url
            )));
        }

        let http_client = HttpClient::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(16)
            .build()?;

        let snapshots = Cache::builder()
            .max_capacity(config.snapshot_cache_capacity)
            .time_to_live(config.snapshot_cache_ttl)
            .build();

        Ok(Self {
            config,
            http_client,
            snapshots,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.config.endpoint(path);

        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .header("Content-Type", "application/json");

        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        if !params.is_empty() {
            request = request.query(params);
        }

        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(method = %method, path, "Sending request");
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                detail: detail_from_body(&message),
                message,
                retry_after,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let policy = self.config.retry;
        let mut attempt = 0;

        loop {
            match self.request(Method::GET, path, None, params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                    let delay = policy.delay_for(attempt, e.retry_after());
                    warn!(
                        path,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body), &[]).await
    }

    /// Stage artifacts of a recorded run. Cached per run id.
    pub async fn fetch_run_stages(&self, run_id: &str) -> Result<RunSnapshot> {
        if let Some(snapshot) = self.snapshots.get(run_id).await {
            debug!(run_id, "Snapshot cache hit");
            return Ok(snapshot);
        }

        let snapshot: RunSnapshot = self
            .get(&format!("/replay/runs/{}/stages", run_id), &[])
            .await?;
        self.snapshots
            .insert(run_id.to_string(), snapshot.clone())
            .await;
        Ok(snapshot)
    }

    /// Drop a cached snapshot so the next fetch hits the API.
    pub async fn invalidate_snapshot(&self, run_id: &str) {
        self.snapshots.invalidate(run_id).await;
    }

    pub async fn run_staged_replay(
        &self,
        request: &StagedReplayRequest,
    ) -> Result<StagedReplayResponse> {
        self.post("/replay/staged", request).await
    }

    pub async fn run_playground(&self, request: &PlaygroundRequest) -> Result<PlaygroundResponse> {
        self.post("/replay", request).await
    }

    pub async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        self.get("/prompts", &[]).await
    }

    pub async fn get_prompt(&self, slug: &str) -> Result<Prompt> {
        self.get(&format!("/prompts/{}", slug), &[]).await
    }

    pub async fn create_prompt(&self, request: &CreatePromptRequest) -> Result<Prompt> {
        self.post("/prompts", request).await
    }

    pub async fn create_prompt_version(
        &self,
        slug: &str,
        request: &CreateVersionRequest,
    ) -> Result<Prompt> {
        self.post(&format!("/prompts/{}/versions", slug), request)
            .await
    }

    pub async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.post("/chat/", request).await
    }

    pub async fn list_runs(&self, query: &RunsQuery) -> Result<RunsResponse> {
        self.get("/runs", &query.to_params()).await
    }

    pub async fn get_run(&self, run_id: &str) -> Result<RunDetail> {
        self.get(&format!("/runs/{}", run_id), &[]).await
    }

    /// Details of 2 to 4 runs side by side. Other counts fail without a request.
    pub async fn compare_runs<S: AsRef<str>>(&self, run_ids: &[S]) -> Result<CompareRunsResponse> {
        let ids = compare_run_ids(run_ids)?;
        self.get("/compare", &[("run_ids", ids)]).await
    }

    pub async fn metrics_summary(&self, range: MetricsRange) -> Result<MetricsSummary> {
        self.get("/metrics/summary", &[("range", range.as_str().to_string())])
            .await
    }

    pub async fn guardrail_policies(&self) -> Result<Vec<GuardrailPolicy>> {
        self.get("/guardrails/policies", &[]).await
    }
}

#[async_trait]
impl ReplayBackend for FulcrumClient {
    async fn fetch_run_stages(&self, run_id: &str) -> BackendResult<RunSnapshot> {
        FulcrumClient::fetch_run_stages(self, run_id)
            .await
            .map_err(BackendError::from)
    }

    async fn run_staged_replay(
        &self,
        request: &StagedReplayRequest,
    ) -> BackendResult<StagedReplayResponse> {
        FulcrumClient::run_staged_replay(self, request)
            .await
            .map_err(BackendError::from)
    }

    async fn run_playground(
        &self,
        request: &PlaygroundRequest,
    ) -> BackendResult<PlaygroundResponse> {
        FulcrumClient::run_playground(self, request)
            .await
            .map_err(BackendError::from)
    }

    async fn create_prompt(&self, request: &CreatePromptRequest) -> BackendResult<Prompt> {
        FulcrumClient::create_prompt(self, request)
            .await
            .map_err(BackendError::from)
    }

    async fn create_prompt_version(
        &self,
        slug: &str,
        request: &CreateVersionRequest,
    ) -> BackendResult<Prompt> {
        FulcrumClient::create_prompt_version(self, slug, request)
            .await
            .map_err(BackendError::from)
    }

    async fn send_chat(&self, request: &ChatRequest) -> BackendResult<ChatResponse> {
        FulcrumClient::send_chat(self, request)
            .await
            .map_err(BackendError::from)
    }
}
