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

//! Confidence bands for backend-computed confidence scores.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLabel {
    Low,
    Medium,
    High,
}

impl ConfidenceLabel {
    /// Band a raw score: above 0.8 is high, above 0.5 medium.
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            ConfidenceLabel::High
        } else if score > 0.5 {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::Low
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(ConfidenceLabel::Low),
            "medium" => Some(ConfidenceLabel::Medium),
            "high" => Some(ConfidenceLabel::High),
            _ => None,
        }
    }

    /// The backend's label when it sent a recognizable one, else the band of `score`.
    pub fn resolve(label: Option<&str>, score: Option<f64>) -> Option<Self> {
        label
            .and_then(Self::parse)
            .or_else(|| score.map(Self::from_score))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLabel::Low => "low",
            ConfidenceLabel::Medium => "medium",
            ConfidenceLabel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_exclusive_at_the_boundary() {
        assert_eq!(ConfidenceLabel::from_score(0.81), ConfidenceLabel::High);
        assert_eq!(ConfidenceLabel::from_score(0.8), ConfidenceLabel::Medium);
        assert_eq!(ConfidenceLabel::from_score(0.5), ConfidenceLabel::Low);
    }

    #[test]
    fn explicit_label_wins() {
        assert_eq!(
            ConfidenceLabel::resolve(Some("HIGH"), Some(0.1)),
            Some(ConfidenceLabel::High)
        );
        assert_eq!(
            ConfidenceLabel::resolve(Some("unsure"), Some(0.6)),
            Some(ConfidenceLabel::Medium)
        );
        assert_eq!(ConfidenceLabel::resolve(None, None), None);
    }
}
