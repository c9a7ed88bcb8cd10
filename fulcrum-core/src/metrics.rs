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

//! Dashboard KPI summary over a trailing time window.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricsRange {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl MetricsRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricsRange::Day => "24h",
            MetricsRange::Week => "7d",
            MetricsRange::Month => "30d",
            MetricsRange::Quarter => "90d",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "24h" => Some(MetricsRange::Day),
            "7d" => Some(MetricsRange::Week),
            "30d" => Some(MetricsRange::Month),
            "90d" => Some(MetricsRange::Quarter),
            _ => None,
        }
    }
}

impl fmt::Display for MetricsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsKpis {
    #[serde(default)]
    pub p50_latency_ms: f64,
    #[serde(default)]
    pub p95_latency_ms: f64,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub avg_confidence: f64,
    /// Fraction of runs whose output parsed, 0.0 to 1.0
    #[serde(default)]
    pub parse_success_rate: f64,
    #[serde(default)]
    pub run_count: u64,
}

/// `GET /metrics/summary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    #[serde(default)]
    pub range: MetricsRange,
    #[serde(default)]
    pub kpis: MetricsKpis,
    #[serde(default)]
    pub models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_defaults_to_seven_days() {
        assert_eq!(MetricsRange::default().as_str(), "7d");
        assert_eq!(MetricsRange::parse("30D"), Some(MetricsRange::Month));
        assert_eq!(MetricsRange::parse("1y"), None);
    }

    #[test]
    fn summary_tolerates_missing_kpis() {
        let summary: MetricsSummary = serde_json::from_str(
            r#"{"range": "24h", "kpis": {"p50_latency_ms": 820.5, "run_count": 42}}"#,
        )
        .unwrap();
        assert_eq!(summary.range, MetricsRange::Day);
        assert_eq!(summary.kpis.run_count, 42);
        assert_eq!(summary.kpis.total_cost_usd, 0.0);
        assert!(summary.models.is_empty());
    }
}
