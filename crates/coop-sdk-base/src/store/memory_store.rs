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

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::StateStore;
use crate::error::StoreResult;

/// In-memory, non-persistent implementation of the `StateStore`.
///
/// Default if no other is configured at startup.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get_custom_value(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set_custom_value(&self, key: &str, value: Vec<u8>) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.values.write().await.insert(key.to_owned(), value))
    }

    async fn remove_custom_value(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.values.write().await.remove(key))
    }
}
