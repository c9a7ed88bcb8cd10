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

//! Chat session
//!
//! The server owns conversation memory and hands out a session id with the
//! first reply. The session adopts that id, sends it back on every later
//! message, and forgets it on [`ChatSession::new_chat`].

use crate::backend::ReplayBackend;
use crate::replay::DEFAULT_MODEL;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};
use uuid::Uuid;

pub const GREETING: &str =
    "Hello! I'm your Sales Predictor AI. How can I help you with forecasting today?";

pub const CHAT_ERROR_FALLBACK: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

/// `POST /chat/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub guardrails: Option<serde_json::Value>,
    #[serde(default)]
    pub context: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    /// Run recorded by the backend for this reply
    pub run_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>, run_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            run_id,
            timestamp: Utc::now(),
        }
    }

    fn greeting() -> Self {
        Self {
            id: "welcome".to_string(),
            ..Self::new(ChatRole::Assistant, GREETING, None)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub retrieval_enabled: bool,
    pub top_k: Option<u32>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            retrieval_enabled: true,
            top_k: None,
        }
    }
}

struct ChatState {
    session_id: Option<String>,
    transcript: Vec<ChatMessage>,
    /// Bumped by `new_chat`; replies from an older conversation are dropped.
    generation: u64,
}

pub struct ChatSession<B> {
    backend: B,
    settings: Mutex<ChatSettings>,
    state: Mutex<ChatState>,
    pending: AtomicBool,
}

impl<B: ReplayBackend> ChatSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_settings(backend, ChatSettings::default())
    }

    pub fn with_settings(backend: B, settings: ChatSettings) -> Self {
        Self {
            backend,
            settings: Mutex::new(settings),
            state: Mutex::new(ChatState {
                session_id: None,
                transcript: vec![ChatMessage::greeting()],
                generation: 0,
            }),
            pending: AtomicBool::new(false),
        }
    }

    /// Resume a conversation the server already knows about.
    pub fn resume(backend: B, session_id: impl Into<String>) -> Self {
        let session = Self::new(backend);
        session.state.lock().session_id = Some(session_id.into());
        session
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.lock().session_id.clone()
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.state.lock().transcript.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn set_model(&self, model: impl Into<String>) {
        self.settings.lock().model = model.into();
    }

    pub fn set_retrieval_enabled(&self, enabled: bool) {
        self.settings.lock().retrieval_enabled = enabled;
    }

    /// Forget the server session and start over from the greeting.
    pub fn new_chat(&self) {
        let mut state = self.state.lock();
        state.session_id = None;
        state.transcript = vec![ChatMessage::greeting()];
        state.generation += 1;
    }

    /// Send one user message and append the reply.
    ///
    /// Returns `None` when the input is blank, another message is still in
    /// flight, or [`new_chat`](Self::new_chat) ran while waiting for the
    /// reply. Backend failures become an assistant message rather than an
    /// error.
    pub async fn send(&self, input: &str) -> Option<ChatMessage> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Chat message ignored: previous message still pending");
            return None;
        }
        let _pending = PendingGuard(&self.pending);

        let (request, generation) = {
            let settings = self.settings.lock();
            let mut state = self.state.lock();
            state
                .transcript
                .push(ChatMessage::new(ChatRole::User, text, None));
            let request = ChatRequest {
                message: text.to_string(),
                model: Some(settings.model.clone()),
                top_k: settings.top_k,
                retrieval_enabled: Some(settings.retrieval_enabled),
                session_id: state.session_id.clone(),
            };
            (request, state.generation)
        };

        let outcome = self.backend.send_chat(&request).await;

        let mut state = self.state.lock();
        if state.generation != generation {
            debug!("Dropping reply from a conversation that was reset");
            return None;
        }

        let reply = match outcome {
            Ok(resp) => {
                if let Some(id) = resp.session_id.filter(|id| !id.is_empty()) {
                    if state.session_id.as_deref() != Some(id.as_str()) {
                        debug!(session_id = %id, "Adopting chat session");
                        state.session_id = Some(id);
                    }
                }
                ChatMessage::new(ChatRole::Assistant, resp.response, resp.run_id)
            }
            Err(e) => {
                error!(error = %e, "Chat request failed");
                let content = match &e {
                    crate::error::BackendError::Api {
                        detail: Some(detail),
                        ..
                    } => detail.clone(),
                    _ => CHAT_ERROR_FALLBACK.to_string(),
                };
                ChatMessage::new(ChatRole::Assistant, content, None)
            }
        };

        state.transcript.push(reply.clone());
        Some(reply)
    }
}

struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
