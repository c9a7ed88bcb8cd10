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

//! Plain-text rendering of run results.

use crate::replay::{RunMetrics, RunResult};
use std::fmt;

pub fn format_latency(latency_ms: f64) -> String {
    format!("{}ms", latency_ms.round() as i64)
}

pub fn format_cost(cost_usd: f64) -> String {
    format!("${:.4}", cost_usd)
}

/// Confidence as a whole percentage.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

pub fn format_parse_success(metrics: &RunMetrics) -> &'static str {
    if metrics.parsed() {
        "YES"
    } else {
        "NO"
    }
}

impl fmt::Display for RunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Latency {} | Cost {} | Confidence {} | Parsed {}",
            format_latency(self.latency_ms),
            format_cost(self.cost_usd),
            format_confidence(self.confidence),
            format_parse_success(self)
        )
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {}", self.new_run_id)?;
        if self.metrics.blocked() {
            writeln!(f, "Blocked by guardrails")?;
        }
        writeln!(f, "{}", self.metrics)?;

        if let Some(text) = self.output_text.as_deref().filter(|t| !t.is_empty()) {
            writeln!(f)?;
            writeln!(f, "Output:")?;
            writeln!(f, "{}", text)?;
        }

        if let Some(forecast) = &self.parsed_forecast {
            writeln!(f)?;
            writeln!(f, "Parsed forecast:")?;
            let pretty = serde_json::to_string_pretty(forecast).map_err(|_| fmt::Error)?;
            writeln!(f, "{}", pretty)?;
        }
        Ok(())
    }
}
