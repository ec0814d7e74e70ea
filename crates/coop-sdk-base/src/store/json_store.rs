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

use std::{
    collections::BTreeMap,
    fmt, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs as async_fs, sync::Mutex};
use tracing::{debug, instrument};

use super::StateStore;
use crate::error::{StoreError, StoreResult};

/// A `StateStore` implementation that keeps all values in a single JSON
/// object and saves it to disk.
///
/// Every write replaces the file atomically by writing a sibling temporary
/// file first and renaming it over the old one. A failed write leaves both the
/// file and the values seen by readers unchanged.
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store backed by the file at `path`.
    ///
    /// Creates the parent directories if needed. A missing file is an empty
    /// store.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let values = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self { path, values: Mutex::new(values) })
    }

    /// The file this store writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, values: &BTreeMap<String, String>) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(values)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        async_fs::write(&tmp, json).await?;
        async_fs::rename(&tmp, &self.path).await?;

        Ok(())
    }
}

impl fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFileStore").field("path", &self.path).finish()
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn get_custom_value(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.values.lock().await.get(key).map(|v| v.clone().into_bytes()))
    }

    #[instrument(skip(self, value))]
    async fn set_custom_value(&self, key: &str, value: Vec<u8>) -> StoreResult<Option<Vec<u8>>> {
        let value = String::from_utf8(value).map_err(|_| StoreError::InvalidUtf8(key.to_owned()))?;

        let mut values = self.values.lock().await;
        let mut updated = values.clone();
        let previous = updated.insert(key.to_owned(), value);
        self.flush(&updated).await?;
        *values = updated;
        debug!("Stored value");

        Ok(previous.map(String::into_bytes))
    }

    #[instrument(skip(self))]
    async fn remove_custom_value(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut values = self.values.lock().await;
        if !values.contains_key(key) {
            return Ok(None);
        }

        let mut updated = values.clone();
        let previous = updated.remove(key);
        self.flush(&updated).await?;
        *values = updated;
        debug!("Removed value");

        Ok(previous.map(String::into_bytes))
    }
}
