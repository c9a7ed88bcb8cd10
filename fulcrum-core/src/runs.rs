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

//! Recorded runs: listing, detail and side-by-side comparison.

use crate::confidence::ConfidenceLabel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Bounds on the number of runs `GET /compare` accepts.
pub const MIN_COMPARE_RUNS: usize = 2;
pub const MAX_COMPARE_RUNS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Running,
    Pending,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Running => "running",
            RunStatus::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunListItem {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    #[serde(default)]
    pub cost_usd: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub confidence_label: Option<String>,
    #[serde(default)]
    pub confidence_components: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub parse_success: Option<f64>,
    #[serde(default)]
    pub started_at: Option<String>,
}

impl RunListItem {
    pub fn label(&self) -> Option<ConfidenceLabel> {
        ConfidenceLabel::resolve(self.confidence_label.as_deref(), self.confidence)
    }
}

/// `GET /runs`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunsResponse {
    #[serde(default)]
    pub runs: Vec<RunListItem>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub statuses: Vec<String>,
}

/// Filters for `GET /runs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunsQuery {
    pub q: Option<String>,
    pub model: Option<String>,
    pub status: Option<RunStatus>,
    pub min_confidence: Option<f64>,
}

impl RunsQuery {
    /// Query-string pairs; empty filters and a zero confidence floor are omitted.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            params.push(("q", q.to_string()));
        }
        if let Some(model) = self.model.as_deref().filter(|m| !m.is_empty()) {
            params.push(("model", model.to_string()));
        }
        if let Some(status) = self.status {
            params.push(("status", status.as_str().to_string()));
        }
        if let Some(min) = self.min_confidence.filter(|m| *m > 0.0) {
            params.push(("min_confidence", min.to_string()));
        }
        params
    }
}

/// File recorded alongside a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunArtifact {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// `GET /runs/{run_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetail {
    #[serde(flatten)]
    pub summary: RunListItem,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub artifacts: Vec<RunArtifact>,
    #[serde(default)]
    pub input_preview: Option<String>,
    #[serde(default)]
    pub output_preview: Option<String>,
    #[serde(default)]
    pub confidence_explanation: Option<String>,
}

/// `GET /compare`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompareRunsResponse {
    #[serde(default)]
    pub runs: Vec<RunDetail>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompareRunsError {
    #[error("Provide {MIN_COMPARE_RUNS}-{MAX_COMPARE_RUNS} run IDs, got {0}")]
    RunCount(usize),

    #[error("Run IDs must not be blank")]
    BlankRunId,
}

/// The `run_ids` query value for `GET /compare`: ids joined by commas.
pub fn compare_run_ids<S: AsRef<str>>(run_ids: &[S]) -> Result<String, CompareRunsError> {
    if !(MIN_COMPARE_RUNS..=MAX_COMPARE_RUNS).contains(&run_ids.len()) {
        return Err(CompareRunsError::RunCount(run_ids.len()));
    }
    let ids: Vec<&str> = run_ids.iter().map(|id| id.as_ref().trim()).collect();
    if ids.iter().any(|id| id.is_empty()) {
        return Err(CompareRunsError::BlankRunId);
    }
    Ok(ids.join(","))
}
