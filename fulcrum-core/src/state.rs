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

//! Replay studio lifecycle state machine.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudioState {
    Idle,
    Loading,
    Ready,
    Dispatching,
    Failed,
}

impl StudioState {
    pub fn can_edit(self) -> bool {
        matches!(self, StudioState::Ready | StudioState::Dispatching)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudioEvent {
    BeginLoad,
    LoadSucceeded,
    LoadFailed,
    Dispatch,
    DispatchSettled,
}

#[derive(Debug, Error)]
#[error("Invalid transition: {current:?} -> {event:?}")]
pub struct InvalidTransition {
    pub current: StudioState,
    pub event: StudioEvent,
}

impl StudioState {
    pub fn transition(self, event: StudioEvent) -> Result<StudioState, InvalidTransition> {
        use StudioEvent::*;
        use StudioState::*;

        let next = match (self, event) {
            (Idle, BeginLoad) => Loading,
            (Failed, BeginLoad) => Loading,
            (Loading, LoadSucceeded) => Ready,
            (Loading, LoadFailed) => Failed,
            (Ready, Dispatch) => Dispatching,
            (Dispatching, DispatchSettled) => Ready,
            _ => {
                return Err(InvalidTransition {
                    current: self,
                    event,
                })
            }
        };

        Ok(next)
    }
}
