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
#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use async_trait::async_trait;
pub use bytes;
pub use coop_sdk_base::{
    store::{DynStateStore, JsonFileStore, MemoryStore, StateStore, StateStoreExt},
    Credentials, Role, SessionGeneration, SessionState, SessionStatus, SessionStore, StoreError,
    UserIdentity,
};
pub use http;
pub use reqwest;

pub mod authentication;
mod client;
pub mod config;
mod error;
mod http_client;
pub mod navigation;

pub use authentication::{Auth, AuthEndpoints, LoginResponse, SessionValidation};
pub use client::{Client, ClientBuildError, ClientBuilder, SessionChange};
pub use error::{ApiError, Error, HttpError, HttpResult, RefreshTokenError, Result};
pub use http_client::{HttpSend, PendingRequest, Request, Response};


#[cfg(test)]
coop_sdk_test::init_tracing_for_tests!();
