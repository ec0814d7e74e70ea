// Copyright 2026 The Coop SDK Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Session state and durable session storage for the cooperative API client.
//!
//! This crate holds no networking code. The [`SessionStore`] is the single
//! source of truth for who is signed in, and the [`store::StateStore`] backends
//! keep a copy of it across process restarts.

#![warn(missing_docs, missing_debug_implementations)]

mod error;
mod session;
mod session_store;
pub mod store;

pub use eyeball;

#[cfg(test)]
coop_sdk_test::init_tracing_for_tests!();

pub use crate::{
    error::{StoreError, StoreResult},
    session::{Credentials, Role, SessionState, SessionStatus, UserIdentity},
    session_store::{SessionGeneration, SessionStore},
};
