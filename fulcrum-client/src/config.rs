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

//! Client configuration
//!
//! Environment variables:
//! - `FULCRUM_API_URL` (default `http://localhost:8000`)
//! - `FULCRUM_API_KEY`
//! - `FULCRUM_TIMEOUT_SECS` (default 30)
//! - `FULCRUM_MAX_RETRIES` (default 3)
//! - `FULCRUM_RETRY_BASE_MS` (default 200)

use crate::retry::RetryPolicy;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Fulcrum API
    pub base_url: String,
    /// Sent as `X-API-Key`
    pub api_key: Option<String>,
    /// Per-request timeout (default: 30 seconds)
    pub timeout: Duration,
    /// Applied to GET requests only
    pub retry: RetryPolicy,
    /// Run snapshots kept in memory
    pub snapshot_cache_capacity: u64,
    pub snapshot_cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            snapshot_cache_capacity: 256,
            snapshot_cache_ttl: Duration::from_secs(300),
        }
    }

    pub fn from_env() -> Self {
        let defaults = RetryPolicy::default();
        Self {
            base_url: env::var("FULCRUM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),

            api_key: env::var("FULCRUM_API_KEY").ok().filter(|k| !k.is_empty()),

            timeout: env::var("FULCRUM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30)),

            retry: RetryPolicy {
                max_retries: env::var("FULCRUM_MAX_RETRIES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_retries),
                base_delay: env::var("FULCRUM_RETRY_BASE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.base_delay),
                ..defaults
            },

            ..Self::new(DEFAULT_API_URL)
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_snapshot_cache(mut self, capacity: u64, ttl: Duration) -> Self {
        self.snapshot_cache_capacity = capacity;
        self.snapshot_cache_ttl = ttl;
        self
    }

    /// `base_url` joined with `path`, tolerating a trailing slash on the base.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
