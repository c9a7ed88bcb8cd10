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

//! Replay studio session
//!
//! One session edits one source run (or, in playground mode, a free-form
//! prompt). The flow is:
//!
//! 1. [`ReplayStudio::load`] fetches the source run's stage artifacts and
//!    seeds model, temperature and the baseline of the override store.
//! 2. The caller moves the replay cursor and edits fields at or after it.
//! 3. [`ReplayStudio::run`] dispatches a staged replay (or playground run)
//!    and keeps the result until the next successful dispatch.
//!
//! At most one dispatch is in flight per session; calling `run` while one
//! is pending returns [`DispatchOutcome::Busy`] without touching the
//! backend. Dropping a `run` or `load` future releases the session.

use crate::artifacts::{ReplayOverrides, StageValue};
use crate::backend::ReplayBackend;
use crate::error::{Result, StudioError};
use crate::overrides::{FieldAccess, JsonEdit, OverrideStore};
use crate::prompt::{CreatePromptRequest, CreateVersionRequest, Prompt, PromptStatus};
use crate::replay::{
    PlaygroundRequest, ReplayOptions, RunResult, RunSnapshot, StagedReplayRequest, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE, MAX_TEMPERATURE, PLAYGROUND_SOURCE,
};
use crate::stage::{ReplayCursor, Stage, StageField};
use crate::state::{StudioEvent, StudioState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

/// Author recorded on prompts saved from the studio when none is given.
pub const DEFAULT_PROMPT_AUTHOR: &str = "User";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioMode {
    /// Ad hoc prompt, no source run
    Playground,
    Replay { source_run_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Completed(RunResult),
    /// Another dispatch was already in flight; nothing was sent.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient notification for the last user-visible outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

struct StudioInner {
    state: StudioState,
    snapshot: Option<RunSnapshot>,
    store: OverrideStore,
    active_stage: Stage,
    model: String,
    temperature: f64,
    options: ReplayOptions,
    prompt: String,
    last_result: Option<RunResult>,
    last_notice: Option<Notice>,
}

enum PendingDispatch {
    Playground(PlaygroundRequest),
    Staged(StagedReplayRequest),
}

pub struct ReplayStudio<B> {
    backend: B,
    mode: StudioMode,
    inner: Mutex<StudioInner>,
    busy: AtomicBool,
}

impl<B: ReplayBackend> ReplayStudio<B> {
    /// Session replaying `source_run_id`. Call [`load`](Self::load) before editing.
    pub fn replay(backend: B, source_run_id: impl Into<String>) -> Self {
        Self::with_mode(
            backend,
            StudioMode::Replay {
                source_run_id: source_run_id.into(),
            },
            StudioState::Idle,
        )
    }

    /// Free-form session; ready immediately.
    pub fn playground(backend: B) -> Self {
        Self::with_mode(backend, StudioMode::Playground, StudioState::Ready)
    }

    fn with_mode(backend: B, mode: StudioMode, state: StudioState) -> Self {
        Self {
            backend,
            mode,
            inner: Mutex::new(StudioInner {
                state,
                snapshot: None,
                store: OverrideStore::default(),
                active_stage: Stage::UserQuestion,
                model: DEFAULT_MODEL.to_string(),
                temperature: DEFAULT_TEMPERATURE,
                options: ReplayOptions::default(),
                prompt: String::new(),
                last_result: None,
                last_notice: None,
            }),
            busy: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> &StudioMode {
        &self.mode
    }

    pub fn is_playground(&self) -> bool {
        self.mode == StudioMode::Playground
    }

    pub fn source_run_id(&self) -> Option<&str> {
        match &self.mode {
            StudioMode::Replay { source_run_id } => Some(source_run_id),
            StudioMode::Playground => None,
        }
    }

    /// Fetch the source run. A session that already loaded (or is loading)
    /// does nothing; a failed session may call this again.
    pub async fn load(&self) -> Result<()> {
        let run_id = match &self.mode {
            StudioMode::Playground => return Ok(()),
            StudioMode::Replay { source_run_id } => source_run_id.clone(),
        };

        {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, StudioState::Idle | StudioState::Failed) {
                debug!(run_id = %run_id, state = ?inner.state, "Source run already loaded");
                return Ok(());
            }
            inner.state = inner.state.transition(StudioEvent::BeginLoad)?;
        }
        let _loading = StateGuard {
            inner: &self.inner,
            from: StudioState::Loading,
            to: StudioState::Idle,
        };

        let fetched = self.backend.fetch_run_stages(&run_id).await;

        let mut inner = self.inner.lock();
        match fetched {
            Ok(snapshot) => {
                inner.model = if snapshot.model.is_empty() {
                    DEFAULT_MODEL.to_string()
                } else {
                    snapshot.model.clone()
                };
                inner.temperature = if snapshot.temperature.is_nan() {
                    DEFAULT_TEMPERATURE
                } else {
                    snapshot.temperature.clamp(0.0, MAX_TEMPERATURE)
                };
                inner.store.set_baseline(snapshot.stages.clone());
                inner.snapshot = Some(snapshot);
                inner.state = inner.state.transition(StudioEvent::LoadSucceeded)?;
                info!(run_id = %run_id, model = %inner.model, "Loaded source run");
                Ok(())
            }
            Err(e) => {
                inner.state = inner.state.transition(StudioEvent::LoadFailed)?;
                let message = e.user_message();
                error!(run_id = %run_id, error = %e, "Failed to load source run");
                inner.last_notice = Some(Notice::error(format!(
                    "Failed to load source run: {}",
                    message
                )));
                Err(StudioError::Load(message))
            }
        }
    }

    pub fn state(&self) -> StudioState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> Option<RunSnapshot> {
        self.inner.lock().snapshot.clone()
    }

    pub fn model(&self) -> String {
        self.inner.lock().model.clone()
    }

    pub fn set_model(&self, model: impl Into<String>) {
        self.inner.lock().model = model.into();
    }

    pub fn temperature(&self) -> f64 {
        self.inner.lock().temperature
    }

    /// Clamped to `0.0..=2.0`; NaN is ignored.
    pub fn set_temperature(&self, temperature: f64) {
        if temperature.is_nan() {
            return;
        }
        self.inner.lock().temperature = temperature.clamp(0.0, MAX_TEMPERATURE);
    }

    pub fn options(&self) -> ReplayOptions {
        self.inner.lock().options
    }

    pub fn set_recompute_retrieval(&self, enabled: bool) {
        self.inner.lock().options.recompute_retrieval = enabled;
    }

    pub fn set_recompute_kpi(&self, enabled: bool) {
        self.inner.lock().options.recompute_kpi = enabled;
    }

    pub fn cursor(&self) -> ReplayCursor {
        self.inner.lock().store.cursor()
    }

    /// Move the replay point; the viewed stage follows it.
    pub fn set_replay_from(&self, cursor: ReplayCursor) {
        let mut inner = self.inner.lock();
        inner.store.set_cursor(cursor);
        inner.active_stage = cursor.stage();
    }

    pub fn active_stage(&self) -> Stage {
        self.inner.lock().active_stage
    }

    pub fn select_stage(&self, stage: Stage) {
        self.inner.lock().active_stage = stage;
    }

    pub fn prompt(&self) -> String {
        self.inner.lock().prompt.clone()
    }

    /// Playground prompt text.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.inner.lock().prompt = prompt.into();
    }

    pub fn current_value(&self, field: StageField) -> StageValue {
        self.inner.lock().store.current_value(field)
    }

    pub fn field_access(&self, field: StageField) -> FieldAccess {
        self.inner.lock().store.access(field)
    }

    /// Edits are accepted once the source run is loaded.
    pub fn set_override(&self, field: StageField, value: impl Into<StageValue>) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.state.can_edit() {
            return Err(StudioError::NotEditable(inner.state));
        }
        inner
            .store
            .set_override(field, value.into())
            .map_err(StudioError::from)
    }

    pub fn edit_json(&self, field: StageField, text: &str) -> Result<JsonEdit> {
        let mut inner = self.inner.lock();
        if !inner.state.can_edit() {
            return Err(StudioError::NotEditable(inner.state));
        }
        inner.store.edit_json(field, text).map_err(StudioError::from)
    }

    pub fn clear_override(&self, field: StageField) {
        self.inner.lock().store.clear_override(field);
    }

    pub fn reset_overrides(&self) {
        self.inner.lock().store.reset();
    }

    /// Every edit held, including ones upstream of the cursor.
    pub fn overrides(&self) -> ReplayOverrides {
        self.inner.lock().store.raw_overrides().clone()
    }

    pub fn last_result(&self) -> Option<RunResult> {
        self.inner.lock().last_result.clone()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.inner.lock().last_notice.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn render_result(&self) -> Option<String> {
        self.last_result().map(|r| r.to_string())
    }

    /// The request a replay dispatch would send right now.
    pub fn staged_request(&self) -> Option<StagedReplayRequest> {
        let inner = self.inner.lock();
        self.staged_request_locked(&inner)
    }

    fn staged_request_locked(&self, inner: &StudioInner) -> Option<StagedReplayRequest> {
        let StudioMode::Replay { source_run_id } = &self.mode else {
            return None;
        };
        let cursor = inner.store.cursor();
        Some(StagedReplayRequest {
            source_run_id: source_run_id.clone(),
            replay_from_stage: cursor,
            model: inner.model.clone(),
            temperature: inner.temperature,
            overrides: inner.store.effective_overrides(),
            options: inner.options.effective(cursor),
        })
    }

    /// Dispatch the session: a staged replay, or a playground run.
    pub async fn run(&self) -> Result<DispatchOutcome> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Dispatch ignored: another run is in flight");
            return Ok(DispatchOutcome::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        let pending = {
            let mut inner = self.inner.lock();
            let pending = match self.staged_request_locked(&inner) {
                Some(request) => PendingDispatch::Staged(request),
                None => {
                    let prompt = inner.prompt.trim();
                    if prompt.is_empty() {
                        inner.last_notice = Some(Notice::error(StudioError::EmptyPrompt.to_string()));
                        return Err(StudioError::EmptyPrompt);
                    }
                    PendingDispatch::Playground(PlaygroundRequest {
                        source_run_id: PLAYGROUND_SOURCE.to_string(),
                        model: inner.model.clone(),
                        temperature: inner.temperature,
                        prompt: Some(prompt.to_string()),
                    })
                }
            };
            inner.state = inner.state.transition(StudioEvent::Dispatch)?;
            pending
        };
        let _dispatching = StateGuard {
            inner: &self.inner,
            from: StudioState::Dispatching,
            to: StudioState::Ready,
        };

        let (operation, success, outcome) = match pending {
            PendingDispatch::Playground(request) => {
                debug!(model = %request.model, "Dispatching playground run");
                (
                    "Run",
                    "Run completed",
                    self.backend.run_playground(&request).await.map(RunResult::from),
                )
            }
            PendingDispatch::Staged(request) => {
                debug!(
                    source_run_id = %request.source_run_id,
                    replay_from_stage = request.replay_from_stage.index(),
                    "Dispatching staged replay"
                );
                (
                    "Replay",
                    "Replay completed successfully",
                    self.backend
                        .run_staged_replay(&request)
                        .await
                        .map(RunResult::from),
                )
            }
        };

        let mut inner = self.inner.lock();
        inner.state = inner.state.transition(StudioEvent::DispatchSettled)?;
        match outcome {
            Ok(result) => {
                info!(
                    new_run_id = %result.new_run_id,
                    latency_ms = result.metrics.latency_ms,
                    confidence = result.metrics.confidence,
                    "{}", success
                );
                inner.last_result = Some(result.clone());
                inner.last_notice = Some(Notice::success(success));
                Ok(DispatchOutcome::Completed(result))
            }
            Err(e) => {
                let err = StudioError::backend(operation, e);
                error!(error = %err, "Dispatch failed");
                inner.last_notice = Some(Notice::error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Template the studio would save: the playground prompt, or the
    /// resolved prompt packet while the Prompt Assembly stage is in view.
    pub fn prompt_template(&self) -> Result<String> {
        let inner = self.inner.lock();
        let template = if self.is_playground() {
            inner.prompt.clone()
        } else if inner.active_stage == Stage::PromptAssembly {
            inner
                .store
                .current_value(StageField::PromptPacket)
                .as_text()
                .unwrap_or_default()
                .to_string()
        } else {
            return Err(StudioError::PromptStageNotActive);
        };

        if template.trim().is_empty() {
            return Err(StudioError::EmptyPromptContent);
        }
        Ok(template)
    }

    /// Save the current template to the prompt library as a new `dev` prompt.
    pub async fn save_prompt(
        &self,
        name: &str,
        slug: &str,
        author: Option<&str>,
    ) -> Result<Prompt> {
        if name.trim().is_empty() || slug.trim().is_empty() {
            return Err(StudioError::MissingPromptIdentity);
        }
        let template = self.prompt_template()?;

        let request = CreatePromptRequest {
            name: name.trim().to_string(),
            slug: slug.trim().to_string(),
            template,
            author: Some(author.unwrap_or(DEFAULT_PROMPT_AUTHOR).to_string()),
            status: Some(PromptStatus::Dev),
            tags: Vec::new(),
        };

        let saved = self
            .backend
            .create_prompt(&request)
            .await
            .map_err(|e| StudioError::backend("Save prompt", e));
        self.record_prompt_outcome(&saved, "Prompt saved to library");
        saved
    }

    /// Append the current template as a new version of an existing prompt.
    pub async fn save_prompt_version(&self, slug: &str, author: Option<&str>) -> Result<Prompt> {
        if slug.trim().is_empty() {
            return Err(StudioError::MissingPromptIdentity);
        }
        let request = CreateVersionRequest {
            template: self.prompt_template()?,
            author: Some(author.unwrap_or(DEFAULT_PROMPT_AUTHOR).to_string()),
        };

        let saved = self
            .backend
            .create_prompt_version(slug.trim(), &request)
            .await
            .map_err(|e| StudioError::backend("Save prompt version", e));
        self.record_prompt_outcome(&saved, "Prompt version saved");
        saved
    }

    fn record_prompt_outcome(&self, outcome: &Result<Prompt>, success: &str) {
        let notice = match outcome {
            Ok(prompt) => {
                info!(slug = %prompt.id, "{}", success);
                Notice::success(success)
            }
            Err(e) => {
                error!(error = %e, "Failed to save prompt");
                Notice::error(e.to_string())
            }
        };
        self.inner.lock().last_notice = Some(notice);
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Puts the session back to `to` if it is still in `from` when dropped,
/// which only happens when the owning future was abandoned mid-request.
struct StateGuard<'a> {
    inner: &'a Mutex<StudioInner>,
    from: StudioState,
    to: StudioState,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.state == self.from {
            inner.state = self.to;
        }
    }
}
