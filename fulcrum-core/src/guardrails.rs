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

//! Guardrail policies configured on the Fulcrum backend (read-only).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    Active,
    /// Violations are logged but not blocked
    Monitor,
    Inactive,
    #[serde(other)]
    Unknown,
}

/// One entry of `GET /guardrails/policies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailPolicy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `pii`, `toxicity`, `topic`, ...
    #[serde(rename = "type")]
    pub kind: String,
    pub status: PolicyStatus,
    #[serde(default)]
    pub violations_24h: u64,
    /// Blocked-term pattern for topic policies
    #[serde(default)]
    pub pattern: Option<String>,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Active => "active",
            PolicyStatus::Monitor => "monitor",
            PolicyStatus::Inactive => "inactive",
            PolicyStatus::Unknown => "unknown",
        }
    }
}

impl GuardrailPolicy {
    pub fn is_active(&self) -> bool {
        self.status == PolicyStatus::Active
    }
}
