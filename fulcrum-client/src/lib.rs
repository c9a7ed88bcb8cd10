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

//! Fulcrum Client
//!
//! HTTP implementation of [`fulcrum_core::ReplayBackend`] plus the read-only
//! prompt library and runs endpoints.

pub mod client;
pub mod config;
pub mod error;
pub mod retry;

pub use client::FulcrumClient;
pub use config::{ClientConfig, DEFAULT_API_URL};
pub use error::{ClientError, Result};
pub use retry::RetryPolicy;
