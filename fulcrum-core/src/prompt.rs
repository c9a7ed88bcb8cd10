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

//! Prompt library types
//!
//! Prompts are addressed by slug and carry an append-only list of versions.

use serde::{Deserialize, Serialize};

/// Release channel of a library prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStatus {
    Prod,
    Staging,
    #[default]
    Dev,
}

impl PromptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptStatus::Prod => "prod",
            PromptStatus::Staging => "staging",
            PromptStatus::Dev => "dev",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVersion {
    /// "v1", "v2", ...
    pub version: String,
    pub template: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Slug
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub latest_version: Option<PromptVersion>,
    #[serde(default)]
    pub versions: Vec<PromptVersion>,
    pub status: PromptStatus,
    pub updated_at: String,
    pub author: String,
}

/// `POST /prompts`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePromptRequest {
    pub name: String,
    pub slug: String,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PromptStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// `POST /prompts/{slug}/versions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVersionRequest {
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}
