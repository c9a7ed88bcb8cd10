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

//! In-memory backend for session tests.

use crate::backend::{BackendResult, ReplayBackend};
use crate::chat::{ChatRequest, ChatResponse};
use crate::error::BackendError;
use crate::prompt::{CreatePromptRequest, CreateVersionRequest, Prompt, PromptStatus};
use crate::replay::{
    PlaygroundRequest, PlaygroundResponse, RunMetrics, RunSnapshot, StagedReplayRequest,
    StagedReplayResponse,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// Records every request and answers from queued responses.
///
/// With no queued response, replays and playground runs succeed with a
/// canned result and chat echoes the message.
#[derive(Default)]
pub struct MockBackend {
    pub snapshot: Mutex<Option<BackendResult<RunSnapshot>>>,
    pub replay_responses: Mutex<VecDeque<BackendResult<StagedReplayResponse>>>,
    pub chat_responses: Mutex<VecDeque<BackendResult<ChatResponse>>>,
    pub snapshot_calls: Mutex<Vec<String>>,
    pub replay_requests: Mutex<Vec<StagedReplayRequest>>,
    pub playground_requests: Mutex<Vec<PlaygroundRequest>>,
    pub prompt_requests: Mutex<Vec<CreatePromptRequest>>,
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    /// When set, replays wait for a notification before answering.
    pub gate: Option<Arc<Notify>>,
    /// Same, for chat messages.
    pub chat_gate: Option<Arc<Notify>>,
}

impl MockBackend {
    pub fn with_snapshot(snapshot: RunSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(Ok(snapshot))),
            ..Default::default()
        }
    }

    pub fn failing_snapshot(err: BackendError) -> Self {
        Self {
            snapshot: Mutex::new(Some(Err(err))),
            ..Default::default()
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn gated_chat(mut self, gate: Arc<Notify>) -> Self {
        self.chat_gate = Some(gate);
        self
    }

    pub fn queue_replay(&self, response: BackendResult<StagedReplayResponse>) {
        self.replay_responses.lock().push_back(response);
    }

    pub fn queue_chat(&self, response: BackendResult<ChatResponse>) {
        self.chat_responses.lock().push_back(response);
    }
}

pub fn sample_snapshot() -> RunSnapshot {
    serde_json::from_value(json!({
        "run_id": "run_abc123",
        "model": "grok-beta",
        "temperature": 0.2,
        "confidence": 0.84,
        "confidence_label": "high",
        "stages": {
            "user_question": "What is Q3 forecast?",
            "retrieved_sources": [{"title": "Q3 pipeline", "score": 0.92}],
            "kpi_summary": {"pipeline_usd": 1250000, "win_rate": 0.31},
            "prompt_packet": "SYSTEM: You are a sales forecaster.\nUSER: What is Q3 forecast?",
            "llm_response": "Q3 is projected at $1.1M.",
            "parsed_forecast": [{"quarter": "Q3", "amount": 1100000}]
        }
    }))
    .expect("sample snapshot")
}

pub fn replay_response(run_id: &str, confidence: f64) -> StagedReplayResponse {
    StagedReplayResponse {
        new_run_id: run_id.to_string(),
        output_text: Some("Q3 is projected at $1.2M.".into()),
        parsed_forecast: None,
        metrics: RunMetrics {
            latency_ms: 1450.0,
            cost_usd: 0.0123,
            confidence,
            parse_success: 1.0,
            ..Default::default()
        },
    }
}

#[async_trait]
impl ReplayBackend for MockBackend {
    async fn fetch_run_stages(&self, run_id: &str) -> BackendResult<RunSnapshot> {
        self.snapshot_calls.lock().push(run_id.to_string());
        self.snapshot
            .lock()
            .clone()
            .unwrap_or_else(|| Err(BackendError::Api {
                status: 404,
                detail: Some("Run not found".into()),
                message: String::new(),
            }))
    }

    async fn run_staged_replay(
        &self,
        request: &StagedReplayRequest,
    ) -> BackendResult<StagedReplayResponse> {
        self.replay_requests.lock().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let queued = self.replay_responses.lock().pop_front();
        queued.unwrap_or_else(|| Ok(replay_response("run_replayed", 0.88)))
    }

    async fn run_playground(
        &self,
        request: &PlaygroundRequest,
    ) -> BackendResult<PlaygroundResponse> {
        self.playground_requests.lock().push(request.clone());
        Ok(PlaygroundResponse {
            new_run_id: "run_playground_1".into(),
            latency_ms: 900.0,
            cost_usd: 0.004,
            confidence: 0.75,
            output_text: format!("Answer to: {}", request.prompt.as_deref().unwrap_or("")),
            view_run_url: Some("/runs/run_playground_1".into()),
        })
    }

    async fn create_prompt(&self, request: &CreatePromptRequest) -> BackendResult<Prompt> {
        self.prompt_requests.lock().push(request.clone());
        Ok(Prompt {
            id: request.slug.clone(),
            name: request.name.clone(),
            latest_version: None,
            versions: vec![],
            status: request.status.unwrap_or(PromptStatus::Dev),
            updated_at: "2025-06-01T10:00:00Z".into(),
            author: request.author.clone().unwrap_or_default(),
        })
    }

    async fn create_prompt_version(
        &self,
        slug: &str,
        request: &CreateVersionRequest,
    ) -> BackendResult<Prompt> {
        Ok(Prompt {
            id: slug.to_string(),
            name: slug.to_string(),
            latest_version: None,
            versions: vec![],
            status: PromptStatus::Dev,
            updated_at: "2025-06-01T10:00:00Z".into(),
            author: request.author.clone().unwrap_or_default(),
        })
    }

    async fn send_chat(&self, request: &ChatRequest) -> BackendResult<ChatResponse> {
        self.chat_requests.lock().push(request.clone());
        if let Some(gate) = &self.chat_gate {
            gate.notified().await;
        }
        let queued = self.chat_responses.lock().pop_front();
        queued.unwrap_or_else(|| {
            Ok(ChatResponse {
                response: format!("echo: {}", request.message),
                run_id: Some("run_chat_1".into()),
                session_id: Some("sess-1".into()),
                guardrails: None,
                context: vec![],
            })
        })
    }
}
