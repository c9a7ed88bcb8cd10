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

//! Backend seam
//!
//! Sessions never talk HTTP themselves. Everything they need from the
//! Fulcrum API goes through [`ReplayBackend`], which the HTTP client
//! implements and tests replace with an in-memory double.

use crate::chat::{ChatRequest, ChatResponse};
use crate::error::BackendError;
use crate::prompt::{CreatePromptRequest, CreateVersionRequest, Prompt};
use crate::replay::{
    PlaygroundRequest, PlaygroundResponse, RunSnapshot, StagedReplayRequest, StagedReplayResponse,
};
use async_trait::async_trait;
use std::sync::Arc;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[async_trait]
pub trait ReplayBackend: Send + Sync {
    /// Per-stage artifacts of a recorded run.
    async fn fetch_run_stages(&self, run_id: &str) -> BackendResult<RunSnapshot>;

    /// Re-execute a run from a chosen stage with overrides.
    async fn run_staged_replay(
        &self,
        request: &StagedReplayRequest,
    ) -> BackendResult<StagedReplayResponse>;

    /// Single-shot completion outside any recorded run.
    async fn run_playground(&self, request: &PlaygroundRequest)
        -> BackendResult<PlaygroundResponse>;

    async fn create_prompt(&self, request: &CreatePromptRequest) -> BackendResult<Prompt>;

    async fn create_prompt_version(
        &self,
        slug: &str,
        request: &CreateVersionRequest,
    ) -> BackendResult<Prompt>;

    async fn send_chat(&self, request: &ChatRequest) -> BackendResult<ChatResponse>;
}

#[async_trait]
impl<B: ReplayBackend + ?Sized> ReplayBackend for Arc<B> {
    async fn fetch_run_stages(&self, run_id: &str) -> BackendResult<RunSnapshot> {
        (**self).fetch_run_stages(run_id).await
    }

    async fn run_staged_replay(
        &self,
        request: &StagedReplayRequest,
    ) -> BackendResult<StagedReplayResponse> {
        (**self).run_staged_replay(request).await
    }

    async fn run_playground(
        &self,
        request: &PlaygroundRequest,
    ) -> BackendResult<PlaygroundResponse> {
        (**self).run_playground(request).await
    }

    async fn create_prompt(&self, request: &CreatePromptRequest) -> BackendResult<Prompt> {
        (**self).create_prompt(request).await
    }

    async fn create_prompt_version(
        &self,
        slug: &str,
        request: &CreateVersionRequest,
    ) -> BackendResult<Prompt> {
        (**self).create_prompt_version(slug, request).await
    }

    async fn send_chat(&self, request: &ChatRequest) -> BackendResult<ChatResponse> {
        (**self).send_chat(request).await
    }
}
