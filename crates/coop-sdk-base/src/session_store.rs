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

//! The authoritative, in-memory holder of the authentication state.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use eyeball::{SharedObservable, Subscriber};
use tracing::{debug, trace};

use crate::session::{Credentials, SessionState, SessionStatus, UserIdentity};

/// A marker identifying one session, from the [`SessionStore::set_credentials`]
/// that started it to the [`SessionStore::clear_credentials`] that ended it.
///
/// Work that started under one session must not write over the next one. Such
/// work reads the generation first and later writes with
/// [`SessionStore::set_credentials_if_generation`] or
/// [`SessionStore::clear_credentials_if_generation`]. Replacing the token of
/// the current session keeps its generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionGeneration(u64);

/// The single source of truth for the authentication state.
///
/// The store is cheap to clone; all clones share the same state. Every
/// mutation replaces the whole [`SessionState`] at once, so readers never see
/// a token without its user.
///
/// # Examples
///
/// ```
/// use coop_sdk_base::{SessionStatus, SessionStore, UserIdentity};
///
/// # let user: UserIdentity = serde_json::from_str(
/// #     r#"{"id": "1", "fullName": "A", "email": "a@b.c", "role": "member"}"#,
/// # ).unwrap();
/// let store = SessionStore::new();
/// assert_eq!(store.status(), SessionStatus::Empty);
///
/// store.set_credentials("token", user);
/// assert_eq!(store.status(), SessionStatus::Authenticated);
///
/// store.clear_credentials();
/// assert_eq!(store.status(), SessionStatus::Empty);
/// ```
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    state: SharedObservable<SessionState>,
    /// Serializes writers and counts sessions.
    generation: Mutex<u64>,
}

impl Default for SessionStoreInner {
    fn default() -> Self {
        Self { state: SharedObservable::new(SessionState::default()), generation: Mutex::new(0) }
    }
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("status", &self.status())
            .field("generation", &self.generation())
            .finish()
    }
}

impl SessionStore {
    /// Create a new, empty `SessionStore`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the current state.
    pub fn get(&self) -> SessionState {
        self.inner.state.get()
    }

    /// Subscribe to changes of the state.
    ///
    /// The subscriber yields a new [`SessionState`] every time one of the
    /// mutation methods changes it.
    pub fn subscribe(&self) -> Subscriber<SessionState> {
        self.inner.state.subscribe()
    }

    /// Where the session currently sits in its lifecycle.
    pub fn status(&self) -> SessionStatus {
        self.inner.state.read().status()
    }

    /// Is a user signed in.
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.read().is_authenticated()
    }

    /// The bearer token of the current session.
    pub fn access_token(&self) -> Option<String> {
        self.inner.state.read().access_token().map(ToOwned::to_owned)
    }

    /// The identity of the signed-in user.
    pub fn user(&self) -> Option<UserIdentity> {
        self.inner.state.read().user().cloned()
    }

    /// The current token and identity.
    pub fn credentials(&self) -> Option<Credentials> {
        self.inner.state.read().credentials.clone()
    }

    /// The current generation.
    pub fn generation(&self) -> SessionGeneration {
        SessionGeneration(*self.lock_writer())
    }

    /// Start a new session with a token and the identity it belongs to.
    ///
    /// This clears any previous error and ends loading. Work still running
    /// for the previous session becomes stale.
    pub fn set_credentials(&self, access_token: impl Into<String>, user: UserIdentity) {
        let mut guard = self.lock_writer();
        *guard += 1;

        self.replace(SessionState {
            credentials: Some(Credentials::new(access_token, user)),
            is_loading: false,
            error: None,
        });
        debug!(generation = *guard, "Session credentials set");
    }

    /// Store a token and the identity it belongs to, but only if no other
    /// session was started or cleared since `generation` was read.
    ///
    /// The generation is kept, so this doesn't make concurrent work for the
    /// same session stale.
    ///
    /// Returns whether the credentials were stored.
    pub fn set_credentials_if_generation(
        &self,
        generation: SessionGeneration,
        access_token: impl Into<String>,
        user: UserIdentity,
    ) -> bool {
        let guard = self.lock_writer();
        if *guard != generation.0 {
            debug!(
                expected = generation.0,
                current = *guard,
                "Session changed in the meantime, dropping stale credentials"
            );
            return false;
        }

        self.replace(SessionState {
            credentials: Some(Credentials::new(access_token, user)),
            is_loading: false,
            error: None,
        });
        debug!("Session credentials replaced");
        true
    }

    /// Reset to the empty session.
    ///
    /// Clearing an already empty session changes nothing observable.
    pub fn clear_credentials(&self) {
        let mut guard = self.lock_writer();
        *guard += 1;

        if self.replace(SessionState::default()) {
            debug!(generation = *guard, "Session credentials cleared");
        } else {
            trace!("Session already empty");
        }
    }

    /// Like [`clear_credentials`](Self::clear_credentials), but only if no
    /// other session was started or cleared since `generation` was read.
    ///
    /// Returns whether the session was cleared.
    pub fn clear_credentials_if_generation(&self, generation: SessionGeneration) -> bool {
        let mut guard = self.lock_writer();
        if *guard != generation.0 {
            debug!(
                expected = generation.0,
                current = *guard,
                "Session changed in the meantime, keeping it"
            );
            return false;
        }

        *guard += 1;
        self.replace(SessionState::default());
        debug!(generation = *guard, "Session credentials cleared");
        true
    }

    /// Flag that a sign-in or a session restore is in progress.
    pub fn set_loading(&self, is_loading: bool) {
        let _guard = self.lock_writer();
        let mut state = self.inner.state.get();
        state.is_loading = is_loading;
        self.replace(state);
    }

    /// Record an error to show to the user. This also ends loading.
    pub fn set_error(&self, message: impl Into<String>) {
        let _guard = self.lock_writer();
        let mut state = self.inner.state.get();
        state.error = Some(message.into());
        state.is_loading = false;
        self.replace(state);
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, u64> {
        self.inner.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the writer lock held. Returns whether the state
    /// changed.
    fn replace(&self, state: SessionState) -> bool {
        let changed = *self.inner.state.read() != state;
        if changed {
            self.inner.state.set(state);
        }
        changed
    }
}
