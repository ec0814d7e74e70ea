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

//! Error conditions.

use std::io::Error as IoError;

use serde_json::Error as JsonError;
use thiserror::Error;

/// Result type of the storage layer.
pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;

/// Errors that can happen while reading or writing the persisted session.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An IO error happened.
    #[error(transparent)]
    Io(#[from] IoError),

    /// An error de/serializing a stored value.
    #[error(transparent)]
    Json(#[from] JsonError),

    /// A stored value was not valid UTF-8.
    #[error("the stored value for `{0}` is not valid UTF-8")]
    InvalidUtf8(String),
}
