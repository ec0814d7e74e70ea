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

//! Navigation intents towards the host application.
//!
//! The client never renders anything. When the session turns out to be
//! invalid it asks the host, through a [`Navigator`], to show the sign-in
//! screen.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

/// The path of the sign-in screen, unless configured otherwise with
/// [`ClientBuilder::sign_in_path`](crate::ClientBuilder::sign_in_path).
pub const DEFAULT_SIGN_IN_PATH: &str = "/login";

/// The host application's router.
pub trait Navigator: fmt::Debug + Send + Sync {
    /// Where the user currently is, as a path or a full URL.
    ///
    /// `None` if the host can't tell.
    fn current_location(&self) -> Option<String>;

    /// Move the user to `path`.
    fn navigate_to(&self, path: &str);
}

/// A [`Navigator`] that goes nowhere, for hosts without screens.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_location(&self) -> Option<String> {
        None
    }

    fn navigate_to(&self, _path: &str) {}
}

/// A [`Navigator`] keeping the current location in memory and recording every
/// navigation.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    state: Mutex<RecordingState>,
}

#[derive(Debug, Default)]
struct RecordingState {
    current: Option<String>,
    history: Vec<String>,
}

impl RecordingNavigator {
    /// Create a navigator with no known location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a navigator currently showing `location`.
    pub fn at(location: impl Into<String>) -> Self {
        let navigator = Self::new();
        navigator.set_current_location(location);
        navigator
    }

    /// Pretend the user moved to `location` on their own.
    pub fn set_current_location(&self, location: impl Into<String>) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).current = Some(location.into());
    }

    /// Every path passed to [`Navigator::navigate_to`], oldest first.
    pub fn history(&self) -> Vec<String> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).history.clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> Option<String> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).current.clone()
    }

    fn navigate_to(&self, path: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.current = Some(path.to_owned());
        state.history.push(path.to_owned());
    }
}

/// Whether `location` points at `path`, ignoring the origin, the query, the
/// fragment and a trailing slash.
pub(crate) fn is_at_path(location: &str, path: &str) -> bool {
    let location = match location.find("://") {
        Some(scheme_end) => {
            let rest = &location[scheme_end + 3..];
            rest.find('/').map_or("/", |start| &rest[start..])
        }
        None => location,
    };
    let location = location.split(['?', '#']).next().unwrap_or_default();

    fn normalize(path: &str) -> &str {
        match path.trim_end_matches('/') {
            "" => "/",
            path => path,
        }
    }

    normalize(location) == normalize(path)
}
