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

//! Error types for replay sessions.

use crate::stage::{Stage, StageField};
use crate::state::{InvalidTransition, StudioState};
use thiserror::Error;

/// Message used when neither the backend nor the transport says what went wrong.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Failure reported by a [`ReplayBackend`](crate::backend::ReplayBackend).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// The backend answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        /// `detail` from the response body, if the backend sent one
        detail: Option<String>,
        message: String,
    },

    /// The request never produced a response.
    #[error("{0}")]
    Transport(String),
}

impl BackendError {
    /// Best-effort user-facing message: backend detail, then transport text,
    /// then a generic fallback.
    pub fn user_message(&self) -> String {
        let message = match self {
            BackendError::Api {
                detail: Some(detail),
                ..
            } => detail.as_str(),
            BackendError::Api { message, .. } => message.as_str(),
            BackendError::Transport(message) => message.as_str(),
        };
        if message.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            message.to_string()
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            BackendError::Transport(_) => None,
        }
    }
}

/// Rejected write to the override store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OverrideError {
    #[error("{field} is read-only: stage '{stage}' is upstream of the replay point")]
    Locked { field: StageField, stage: Stage },

    #[error("{0} is produced by the backend and cannot be overridden")]
    NotOverridable(StageField),

    #[error("value for {0} has the wrong shape")]
    ShapeMismatch(StageField),
}

/// Errors raised by a replay studio or chat session.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Override(#[from] OverrideError),

    #[error("Overrides cannot be edited while the session is {0:?}")]
    NotEditable(StudioState),

    #[error("Failed to load source run: {0}")]
    Load(String),

    #[error("Please enter a prompt")]
    EmptyPrompt,

    #[error("Navigate to the 'Prompt Assembly' stage to save the prompt.")]
    PromptStageNotActive,

    #[error("Prompt content is empty.")]
    EmptyPromptContent,

    #[error("Prompt name and slug are required")]
    MissingPromptIdentity,

    #[error("{operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
        #[source]
        source: BackendError,
    },
}

impl StudioError {
    pub(crate) fn backend(operation: &'static str, source: BackendError) -> Self {
        StudioError::Backend {
            operation,
            message: source.user_message(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
