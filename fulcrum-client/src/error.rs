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

use fulcrum_core::{BackendError, CompareRunsError};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        /// Raw response body
        message: String,
        /// `detail` field of a JSON error body
        detail: Option<String>,
        retry_after: Option<Duration>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rejected before any request was sent
    #[error(transparent)]
    Compare(#[from] CompareRunsError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Network failures, rate limiting and server errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            ClientError::Serialization(_)
            | ClientError::InvalidConfig(_)
            | ClientError::Compare(_) => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ClientError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Pull `detail` out of a FastAPI-style error body.
///
/// Validation errors carry a list of `{msg, ...}` objects; their messages
/// are joined.
pub fn detail_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let detail = value.get("detail")?;
    let text = match detail {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item.get("msg").and_then(Value::as_str) {
                Some(msg) => msg.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => return None,
        other => other.to_string(),
    };
    Some(text).filter(|t| !t.is_empty())
}

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api {
                status,
                message,
                detail,
                ..
            } => BackendError::Api {
                status,
                detail,
                message,
            },
            other => BackendError::Transport(other.to_string()),
        }
    }
}
