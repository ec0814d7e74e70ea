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

//! User sessions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// The role of a cooperative account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A back-office administrator approving loans, savings and payments.
    Admin,
    /// A regular member of the cooperative.
    Member,
}

impl Role {
    /// The path a user with this role lands on after signing in.
    pub fn home_path(self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::Member => "/dashboard",
        }
    }
}

fn default_active() -> bool {
    true
}

/// The identity of the signed-in user, as returned by the API.
///
/// An identity is never patched field by field: a newer one replaces it
/// wholesale. Fields this crate doesn't know about are kept in [`extra`] so
/// that the identity survives a round-trip through the persisted session.
///
/// [`extra`]: UserIdentity::extra
///
/// # Examples
///
/// ```
/// use coop_sdk_base::{Role, UserIdentity};
///
/// let user: UserIdentity = serde_json::from_str(
///     r#"{"id": "42", "fullName": "Ada Obi", "email": "ada@example.org", "role": "member", "active": true}"#,
/// )
/// .unwrap();
///
/// assert_eq!(user.role, Role::Member);
/// assert_eq!(user.role.home_path(), "/dashboard");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// The unique ID of the account.
    #[serde(alias = "_id")]
    pub id: String,
    /// The display name of the account holder.
    pub full_name: String,
    /// The email address used to sign in.
    pub email: String,
    /// Whether this is an administrator or a member.
    pub role: Role,
    /// Whether the account is enabled.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Any other field the API sent along.
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}

/// A bearer token together with the identity it was issued for.
///
/// Keeping both in a single value makes it impossible to hold a token
/// without a user, or a user without a token.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// The bearer token sent with every authenticated request.
    pub access_token: String,
    /// The user the access token was issued for.
    pub user: UserIdentity,
}

impl Credentials {
    /// Create new `Credentials` from a token and an identity.
    pub fn new(access_token: impl Into<String>, user: UserIdentity) -> Self {
        Self { access_token: access_token.into(), user }
    }
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("user_id", &self.user.id).finish_non_exhaustive()
    }
}

/// Coarse view of the session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Nobody is signed in.
    Empty,
    /// Nobody is signed in yet, but a sign-in or a session restore is running.
    Loading,
    /// A user is signed in.
    Authenticated,
}

/// The full authentication state observed by the UI.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    /// The current credentials, if signed in.
    pub credentials: Option<Credentials>,
    /// Whether a sign-in or a session restore is in progress.
    pub is_loading: bool,
    /// The last error to show to the user, if any.
    pub error: Option<String>,
}

impl SessionState {
    /// The bearer token of the current session.
    pub fn access_token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.access_token.as_str())
    }

    /// The identity of the signed-in user.
    pub fn user(&self) -> Option<&UserIdentity> {
        self.credentials.as_ref().map(|c| &c.user)
    }

    /// Is a user signed in.
    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Where this state sits in the session lifecycle.
    pub fn status(&self) -> SessionStatus {
        match (&self.credentials, self.is_loading) {
            (Some(_), _) => SessionStatus::Authenticated,
            (None, true) => SessionStatus::Loading,
            (None, false) => SessionStatus::Empty,
        }
    }
}
