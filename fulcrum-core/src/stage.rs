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

//! Stage registry
//!
//! The forecasting pipeline always runs the same six stages in the same
//! order. Each stage owns one or more artifact fields; the replay cursor
//! locks every field whose stage sits before it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of stages in the pipeline.
pub const STAGE_COUNT: usize = 6;

/// One named step of the pipeline, ordered by execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Stage {
    UserQuestion = 0,
    Retrieval = 1,
    KpiSummary = 2,
    PromptAssembly = 3,
    ModelResponse = 4,
    ParsedForecast = 5,
}

/// Registry of all stages, in pipeline order.
pub const STAGES: [Stage; STAGE_COUNT] = [
    Stage::UserQuestion,
    Stage::Retrieval,
    Stage::KpiSummary,
    Stage::PromptAssembly,
    Stage::ModelResponse,
    Stage::ParsedForecast,
];

impl Stage {
    /// Look up a stage by its pipeline index.
    pub fn from_index(index: usize) -> Option<Stage> {
        STAGES.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name shown in stage navigation.
    pub fn name(self) -> &'static str {
        match self {
            Stage::UserQuestion => "User Question",
            Stage::Retrieval => "Knowledge Retrieval",
            Stage::KpiSummary => "KPI Summary",
            Stage::PromptAssembly => "Prompt Assembly",
            Stage::ModelResponse => "Model Response",
            Stage::ParsedForecast => "Parsed Forecast",
        }
    }

    /// Artifact fields produced by this stage.
    pub fn fields(self) -> &'static [StageField] {
        match self {
            Stage::UserQuestion => &[StageField::UserQuestion],
            Stage::Retrieval => &[StageField::RetrievedSources],
            Stage::KpiSummary => &[StageField::KpiSummary],
            Stage::PromptAssembly => &[StageField::PromptPacket],
            Stage::ModelResponse => &[StageField::LlmResponse],
            Stage::ParsedForecast => &[StageField::ParsedForecast, StageField::ParseError],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.index(), self.name())
    }
}

/// Shape of the value stored under a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text
    Text,
    /// JSON array of objects
    List,
    /// JSON object
    Object,
}

/// Artifact field recorded for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageField {
    UserQuestion,
    RetrievedSources,
    KpiSummary,
    PromptPacket,
    LlmResponse,
    ParsedForecast,
    ParseError,
}

/// Every artifact field, in stage order.
pub const STAGE_FIELDS: [StageField; 7] = [
    StageField::UserQuestion,
    StageField::RetrievedSources,
    StageField::KpiSummary,
    StageField::PromptPacket,
    StageField::LlmResponse,
    StageField::ParsedForecast,
    StageField::ParseError,
];

impl StageField {
    pub fn parse(s: &str) -> Option<Self> {
        STAGE_FIELDS.iter().copied().find(|f| f.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageField::UserQuestion => "user_question",
            StageField::RetrievedSources => "retrieved_sources",
            StageField::KpiSummary => "kpi_summary",
            StageField::PromptPacket => "prompt_packet",
            StageField::LlmResponse => "llm_response",
            StageField::ParsedForecast => "parsed_forecast",
            StageField::ParseError => "parse_error",
        }
    }

    /// The stage that produces this field.
    pub fn stage(self) -> Stage {
        match self {
            StageField::UserQuestion => Stage::UserQuestion,
            StageField::RetrievedSources => Stage::Retrieval,
            StageField::KpiSummary => Stage::KpiSummary,
            StageField::PromptPacket => Stage::PromptAssembly,
            StageField::LlmResponse => Stage::ModelResponse,
            StageField::ParsedForecast | StageField::ParseError => Stage::ParsedForecast,
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            StageField::UserQuestion | StageField::PromptPacket | StageField::LlmResponse => {
                FieldKind::Text
            }
            StageField::RetrievedSources | StageField::ParsedForecast => FieldKind::List,
            StageField::KpiSummary | StageField::ParseError => FieldKind::Object,
        }
    }

    /// Parsed outputs are always recomputed by the backend and cannot be overridden.
    pub fn is_overridable(self) -> bool {
        !matches!(self, StageField::ParsedForecast | StageField::ParseError)
    }
}

impl fmt::Display for StageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of the first stage a replay may mutate.
///
/// Stages before the cursor are read-only; the cursor itself and every later
/// stage are editable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ReplayCursor(u8);

impl ReplayCursor {
    pub const FIRST: ReplayCursor = ReplayCursor(0);

    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < STAGE_COUNT).then_some(Self(index))
    }

    pub fn stage(self) -> Stage {
        STAGES[self.0 as usize]
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Whether `stage` is upstream of the cursor and therefore read-only.
    pub fn locks(self, stage: Stage) -> bool {
        stage.index() < self.0 as usize
    }
}

impl From<Stage> for ReplayCursor {
    fn from(stage: Stage) -> Self {
        Self(stage as u8)
    }
}

impl TryFrom<u8> for ReplayCursor {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ReplayCursor::new(value)
            .ok_or_else(|| format!("replay_from_stage must be in 0..={}", STAGE_COUNT - 1))
    }
}

impl From<ReplayCursor> for u8 {
    fn from(cursor: ReplayCursor) -> Self {
        cursor.0
    }
}
