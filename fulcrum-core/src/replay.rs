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

//! Wire types for the replay endpoints.

use crate::artifacts::{JsonObject, ReplayOverrides, StageArtifacts};
use crate::confidence::ConfidenceLabel;
use crate::stage::ReplayCursor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source run id sent for ad hoc playground runs.
pub const PLAYGROUND_SOURCE: &str = "playground";

/// Model used when a source run does not record one.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

pub const DEFAULT_TEMPERATURE: f64 = 0.7;

pub const MAX_TEMPERATURE: f64 = 2.0;

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// `GET /replay/runs/{run_id}/stages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub confidence_label: Option<String>,
    #[serde(default)]
    pub confidence_components: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub stages: StageArtifacts,
}

impl RunSnapshot {
    pub fn label(&self) -> Option<ConfidenceLabel> {
        ConfidenceLabel::resolve(self.confidence_label.as_deref(), self.confidence)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOptions {
    #[serde(default)]
    pub recompute_retrieval: bool,
    #[serde(default)]
    pub recompute_kpi: bool,
}

impl ReplayOptions {
    /// Retrieval can only be recomputed when replaying from stage 1 or
    /// earlier, KPIs from stage 2 or earlier.
    pub fn effective(self, cursor: ReplayCursor) -> Self {
        Self {
            recompute_retrieval: self.recompute_retrieval && cursor.index() <= 1,
            recompute_kpi: self.recompute_kpi && cursor.index() <= 2,
        }
    }
}

/// `POST /replay/staged`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedReplayRequest {
    pub source_run_id: String,
    pub replay_from_stage: ReplayCursor,
    pub model: String,
    pub temperature: f64,
    pub overrides: ReplayOverrides,
    pub options: ReplayOptions,
}

/// Metrics reported for a finished run.
///
/// The backend sends a flat map of numbers; the known keys are lifted out
/// and anything else (such as `blocked`) lands in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub parse_success: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

impl RunMetrics {
    pub fn parsed(&self) -> bool {
        self.parse_success > 0.0
    }

    /// Guardrails stopped the run before the model was called.
    pub fn blocked(&self) -> bool {
        self.extra.get("blocked").is_some_and(|v| *v > 0.0)
    }
}

/// Response of `POST /replay/staged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedReplayResponse {
    pub new_run_id: String,
    #[serde(default)]
    pub output_text: Option<String>,
    #[serde(default)]
    pub parsed_forecast: Option<Vec<JsonObject>>,
    #[serde(default)]
    pub metrics: RunMetrics,
}

/// `POST /replay`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaygroundRequest {
    pub source_run_id: String,
    pub model: String,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Response of `POST /replay`. Metrics are flat on this endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaygroundResponse {
    pub new_run_id: String,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub output_text: String,
    #[serde(default)]
    pub view_run_url: Option<String>,
}

/// Outcome of one dispatch, in a shape shared by both endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub new_run_id: String,
    pub output_text: Option<String>,
    pub parsed_forecast: Option<Vec<JsonObject>>,
    pub metrics: RunMetrics,
}

impl From<StagedReplayResponse> for RunResult {
    fn from(resp: StagedReplayResponse) -> Self {
        Self {
            new_run_id: resp.new_run_id,
            output_text: resp.output_text,
            parsed_forecast: resp.parsed_forecast,
            metrics: resp.metrics,
        }
    }
}

impl From<PlaygroundResponse> for RunResult {
    fn from(resp: PlaygroundResponse) -> Self {
        Self {
            new_run_id: resp.new_run_id,
            output_text: Some(resp.output_text),
            parsed_forecast: None,
            // Playground runs are never parsed
            metrics: RunMetrics {
                latency_ms: resp.latency_ms,
                cost_usd: resp.cost_usd,
                confidence: resp.confidence,
                parse_success: 0.0,
                extra: BTreeMap::new(),
            },
        }
    }
}
