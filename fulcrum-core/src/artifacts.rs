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

//! Per-stage artifacts recorded for a run, and the sparse override record
//! that patches them for a replay.

use crate::stage::{FieldKind, StageField};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON object as stored in retrieval sources, KPI summaries and forecasts.
pub type JsonObject = serde_json::Map<String, Value>;

/// Value held by a stage field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageValue {
    Text(String),
    List(Vec<JsonObject>),
    Object(JsonObject),
}

impl StageValue {
    /// Default shown for a field with neither an override nor a baseline.
    pub fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => StageValue::Text(String::new()),
            FieldKind::List => StageValue::List(Vec::new()),
            FieldKind::Object => StageValue::Object(JsonObject::new()),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            StageValue::Text(_) => FieldKind::Text,
            StageValue::List(_) => FieldKind::List,
            StageValue::Object(_) => FieldKind::Object,
        }
    }

    /// Convert arbitrary JSON into a value of the requested shape.
    ///
    /// Returns `None` when the JSON does not have that shape; a list must
    /// contain only objects.
    pub fn from_json(kind: FieldKind, value: Value) -> Option<Self> {
        match (kind, value) {
            (FieldKind::Text, Value::String(s)) => Some(StageValue::Text(s)),
            (FieldKind::Object, Value::Object(map)) => Some(StageValue::Object(map)),
            (FieldKind::List, Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(StageValue::List),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StageValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            StageValue::Text(s) => s.is_empty(),
            StageValue::List(items) => items.is_empty(),
            StageValue::Object(map) => map.is_empty(),
        }
    }

    /// Render for an editor: text verbatim, structured values as pretty JSON.
    pub fn to_editor_text(&self) -> String {
        match self {
            StageValue::Text(s) => s.clone(),
            StageValue::List(items) => {
                serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string())
            }
            StageValue::Object(map) => {
                serde_json::to_string_pretty(map).unwrap_or_else(|_| "{}".to_string())
            }
        }
    }
}

impl From<&str> for StageValue {
    fn from(s: &str) -> Self {
        StageValue::Text(s.to_string())
    }
}

impl From<String> for StageValue {
    fn from(s: String) -> Self {
        StageValue::Text(s)
    }
}

/// Baseline artifacts of a recorded run. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageArtifacts {
    #[serde(default)]
    pub user_question: Option<String>,
    #[serde(default)]
    pub retrieved_sources: Option<Vec<JsonObject>>,
    #[serde(default)]
    pub kpi_summary: Option<JsonObject>,
    #[serde(default)]
    pub prompt_packet: Option<String>,
    #[serde(default)]
    pub llm_response: Option<String>,
    #[serde(default)]
    pub parsed_forecast: Option<Vec<JsonObject>>,
    #[serde(default)]
    pub parse_error: Option<JsonObject>,
}

impl StageArtifacts {
    pub fn get(&self, field: StageField) -> Option<StageValue> {
        match field {
            StageField::UserQuestion => self.user_question.clone().map(StageValue::Text),
            StageField::RetrievedSources => self.retrieved_sources.clone().map(StageValue::List),
            StageField::KpiSummary => self.kpi_summary.clone().map(StageValue::Object),
            StageField::PromptPacket => self.prompt_packet.clone().map(StageValue::Text),
            StageField::LlmResponse => self.llm_response.clone().map(StageValue::Text),
            StageField::ParsedForecast => self.parsed_forecast.clone().map(StageValue::List),
            StageField::ParseError => self.parse_error.clone().map(StageValue::Object),
        }
    }
}

/// Sparse replacement values for the overridable fields.
///
/// Serialized as-is into the staged replay request, so absent fields are
/// omitted from the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_sources: Option<Vec<JsonObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpi_summary: Option<JsonObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_packet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_response: Option<String>,
}

impl ReplayOverrides {
    pub fn get(&self, field: StageField) -> Option<StageValue> {
        match field {
            StageField::UserQuestion => self.user_question.clone().map(StageValue::Text),
            StageField::RetrievedSources => self.retrieved_sources.clone().map(StageValue::List),
            StageField::KpiSummary => self.kpi_summary.clone().map(StageValue::Object),
            StageField::PromptPacket => self.prompt_packet.clone().map(StageValue::Text),
            StageField::LlmResponse => self.llm_response.clone().map(StageValue::Text),
            StageField::ParsedForecast | StageField::ParseError => None,
        }
    }

    pub fn contains(&self, field: StageField) -> bool {
        match field {
            StageField::UserQuestion => self.user_question.is_some(),
            StageField::RetrievedSources => self.retrieved_sources.is_some(),
            StageField::KpiSummary => self.kpi_summary.is_some(),
            StageField::PromptPacket => self.prompt_packet.is_some(),
            StageField::LlmResponse => self.llm_response.is_some(),
            StageField::ParsedForecast | StageField::ParseError => false,
        }
    }

    /// Store `value` under `field`.
    ///
    /// Hands the value back when the field is not overridable or the value
    /// has the wrong shape for it.
    pub fn insert(&mut self, field: StageField, value: StageValue) -> Result<(), StageValue> {
        match (field, value) {
            (StageField::UserQuestion, StageValue::Text(s)) => self.user_question = Some(s),
            (StageField::RetrievedSources, StageValue::List(items)) => {
                self.retrieved_sources = Some(items)
            }
            (StageField::KpiSummary, StageValue::Object(map)) => self.kpi_summary = Some(map),
            (StageField::PromptPacket, StageValue::Text(s)) => self.prompt_packet = Some(s),
            (StageField::LlmResponse, StageValue::Text(s)) => self.llm_response = Some(s),
            (_, value) => return Err(value),
        }
        Ok(())
    }

    pub fn remove(&mut self, field: StageField) {
        match field {
            StageField::UserQuestion => self.user_question = None,
            StageField::RetrievedSources => self.retrieved_sources = None,
            StageField::KpiSummary => self.kpi_summary = None,
            StageField::PromptPacket => self.prompt_packet = None,
            StageField::LlmResponse => self.llm_response = None,
            StageField::ParsedForecast | StageField::ParseError => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &ReplayOverrides::default()
    }
}
