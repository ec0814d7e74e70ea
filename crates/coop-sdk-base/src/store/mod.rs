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

//! Durable storage for the session, so it survives a restart.
//!
//! The persisted layout is exactly two entries: the bearer token under
//! [`ACCESS_TOKEN_KEY`] and the serialized [`UserIdentity`] under [`USER_KEY`].
//! The in-memory [`SessionStore`](crate::SessionStore) stays the authority
//! while the process is running; a [`StateStore`] is only a cache of it.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tracing::warn;

use crate::{
    error::{StoreError, StoreResult},
    session::{Credentials, UserIdentity},
};

mod json_store;
mod memory_store;

pub use self::{json_store::JsonFileStore, memory_store::MemoryStore};

/// The key under which the bearer token is stored.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// The key under which the serialized user identity is stored.
pub const USER_KEY: &str = "user";

/// An abstract key/value store holding the persisted session.
#[async_trait]
pub trait StateStore: fmt::Debug + Send + Sync {
    /// Get a value from the store.
    async fn get_custom_value(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Put a value in the store, returning the previous one.
    async fn set_custom_value(&self, key: &str, value: Vec<u8>) -> StoreResult<Option<Vec<u8>>>;

    /// Remove a value from the store, returning it.
    async fn remove_custom_value(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
}

/// A type-erased [`StateStore`].
pub type DynStateStore = dyn StateStore;

/// Shared handle to a type-erased [`StateStore`].
pub type SharedStateStore = Arc<DynStateStore>;

/// Convenience methods built on top of [`StateStore`].
#[async_trait]
pub trait StateStoreExt: StateStore {
    /// Load the persisted session, if both entries are present.
    ///
    /// A token without a user, or a user without a token, is treated as no
    /// session at all.
    async fn load_session(&self) -> StoreResult<Option<Credentials>> {
        let token = self.get_custom_value(ACCESS_TOKEN_KEY).await?;
        let user = self.get_custom_value(USER_KEY).await?;

        match (token, user) {
            (Some(token), Some(user)) => {
                let access_token = String::from_utf8(token)
                    .map_err(|_| StoreError::InvalidUtf8(ACCESS_TOKEN_KEY.to_owned()))?;
                let user: UserIdentity = serde_json::from_slice(&user)?;
                Ok(Some(Credentials { access_token, user }))
            }
            (None, None) => Ok(None),
            _ => {
                warn!("Found only half of a persisted session, ignoring it");
                Ok(None)
            }
        }
    }

    /// Persist the given session, replacing any previous one.
    async fn save_session(&self, credentials: &Credentials) -> StoreResult<()> {
        let user = serde_json::to_vec(&credentials.user)?;
        self.set_custom_value(ACCESS_TOKEN_KEY, credentials.access_token.clone().into_bytes())
            .await?;
        self.set_custom_value(USER_KEY, user).await?;
        Ok(())
    }

    /// Remove the persisted session.
    async fn clear_session(&self) -> StoreResult<()> {
        self.remove_custom_value(ACCESS_TOKEN_KEY).await?;
        self.remove_custom_value(USER_KEY).await?;
        Ok(())
    }
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStoreExt for T {}
