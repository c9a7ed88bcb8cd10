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

//! Fulcrum Core
//!
//! Client-side state for staged replay of recorded LLM runs: the stage
//! registry, the cursor-locked override store, the session state machine
//! and the wire types shared with the Fulcrum API.

pub mod artifacts;
pub mod backend;
pub mod chat;
pub mod confidence;
pub mod error;
pub mod guardrails;
pub mod metrics;
pub mod overrides;
pub mod prompt;
pub mod render;
pub mod replay;
pub mod runs;
pub mod stage;
pub mod state;
pub mod studio;

#[cfg(test)]
mod testing;

pub use artifacts::{JsonObject, ReplayOverrides, StageArtifacts, StageValue};
pub use backend::{BackendResult, ReplayBackend};
pub use chat::{ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatSession, ChatSettings};
pub use confidence::ConfidenceLabel;
pub use error::{BackendError, OverrideError, Result, StudioError};
pub use guardrails::{GuardrailPolicy, PolicyStatus};
pub use metrics::{MetricsKpis, MetricsRange, MetricsSummary};
pub use overrides::{FieldAccess, JsonEdit, OverrideStore};
pub use prompt::{CreatePromptRequest, CreateVersionRequest, Prompt, PromptStatus, PromptVersion};
pub use replay::{
    PlaygroundRequest, PlaygroundResponse, ReplayOptions, RunMetrics, RunResult, RunSnapshot,
    StagedReplayRequest, StagedReplayResponse,
};
pub use runs::{
    compare_run_ids, CompareRunsError, CompareRunsResponse, RunArtifact, RunDetail, RunListItem,
    RunStatus, RunsQuery, RunsResponse, MAX_COMPARE_RUNS, MIN_COMPARE_RUNS,
};
pub use stage::{FieldKind, ReplayCursor, Stage, StageField, STAGES, STAGE_COUNT, STAGE_FIELDS};
pub use state::{InvalidTransition, StudioEvent, StudioState};
pub use studio::{DispatchOutcome, Notice, NoticeLevel, ReplayStudio, StudioMode};
