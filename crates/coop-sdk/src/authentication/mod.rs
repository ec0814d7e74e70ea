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

//! Signing in and out, and keeping the access token fresh.
//!
//! The API hands out a short-lived bearer token on sign-in, and keeps the
//! long-lived refresh credential in an HTTP-only cookie. The client never sees
//! that cookie; it only asks the API for a new access token when the current
//! one gets rejected.

use std::fmt;

use coop_sdk_base::{
    store::StateStoreExt, Credentials, SessionGeneration, SessionStatus, SessionStore,
    UserIdentity,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    client::SessionChange,
    error::{Error, HttpError, HttpResult, RefreshTokenError, Result},
    Client, Request,
};

/// The paths of the authentication endpoints, relative to the base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthEndpoints {
    /// Exchanges an email and a password for an access token.
    pub login: String,
    /// Ends the session on the server side.
    pub logout: String,
    /// Issues a new access token against the refresh cookie.
    pub refresh_token: String,
    /// Tells whether an access token is still accepted.
    pub validate: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "/login".to_owned(),
            logout: "/logout".to_owned(),
            refresh_token: "/refresh-token".to_owned(),
            validate: "/validate".to_owned(),
        }
    }
}

/// All the data relative to authentication, shared by all the clones of a
/// [`Client`].
pub(crate) struct AuthCtx {
    pub(crate) endpoints: AuthEndpoints,

    /// Lock making sure we're only doing one token refresh at a time, when
    /// refreshes are coalesced.
    pub(crate) refresh_token_lock: Option<Mutex<Result<(), RefreshTokenError>>>,

    /// Held while the in-memory session and the persisted copy are updated
    /// together, so both see writes in the same order.
    pub(crate) persist_lock: Mutex<()>,

    /// Lock making sure only one session restore runs at a time, with the
    /// outcome of the last one.
    pub(crate) init_lock: Mutex<Option<SessionStatus>>,

    /// Session change publisher.
    pub(crate) session_change_sender: broadcast::Sender<SessionChange>,
}

impl AuthCtx {
    pub(crate) fn new(endpoints: AuthEndpoints, coalesce_token_refreshes: bool) -> Self {
        let (session_change_sender, _) = broadcast::channel(16);
        Self {
            endpoints,
            refresh_token_lock: coalesce_token_refreshes.then(|| Mutex::new(Ok(()))),
            persist_lock: Mutex::new(()),
            init_lock: Mutex::new(None),
            session_change_sender,
        }
    }
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for AuthCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCtx")
            .field("endpoints", &self.endpoints)
            .field("coalesce_token_refreshes", &self.refresh_token_lock.is_some())
            .finish_non_exhaustive()
    }
}

/// The body of a successful sign-in.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// The bearer token for the new session.
    pub access_token: String,
    /// The signed-in user.
    pub user: UserIdentity,
    /// A greeting from the API, if any.
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("user", &self.user)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default)]
    user: Option<UserIdentity>,
}

/// What the API thinks of an access token.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionValidation {
    /// The token is accepted.
    Valid {
        /// A fresher identity, if the API sent one along.
        user: Option<UserIdentity>,
    },
    /// The token is rejected.
    Invalid {
        /// The status code of the rejection.
        status: http::StatusCode,
    },
}

/// A high-level API to manage the session of a [`Client`].
#[derive(Debug, Clone)]
pub struct Auth {
    client: Client,
}

impl Auth {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    fn ctx(&self) -> &AuthCtx {
        &self.client.inner.auth_ctx
    }

    fn notify(&self, change: SessionChange) {
        _ = self.ctx().session_change_sender.send(change);
    }

    /// Sign in with an email and a password.
    ///
    /// On success the session is stored, persisted and
    /// [`SessionChange::LoggedIn`] is broadcast. If the API refuses the
    /// credentials, its message is returned as is in
    /// [`Error::CredentialRejected`] and recorded as the session error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use coop_sdk::Client;
    /// # async {
    /// let client = Client::builder().base_url("https://coop.example.org/api").build()?;
    ///
    /// let response = client.auth().login("ada@example.org", "secret").await?;
    /// println!("Welcome {}", response.user.full_name);
    /// # Ok::<(), Box<dyn std::error::Error>>(()) };
    /// ```
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let session = self.client.session();
        session.set_loading(true);

        let request = Request::post(self.ctx().endpoints.login.as_str())
            .json(json!({ "email": email, "password": password }));

        let response = match self.client.send_inner(&request, None, None).await {
            Ok(response) => response,
            Err(HttpError::Api(error)) if error.status.is_client_error() => {
                let message = error.display_message();
                info!(status = %error.status, "Sign-in rejected");
                session.set_error(message.clone());
                return Err(Error::CredentialRejected { status: error.status, message });
            }
            Err(error) => {
                warn!("Sign-in request failed: {error}");
                session.set_error(error.to_string());
                return Err(error.into());
            }
        };

        let response: LoginResponse = match response.json() {
            Ok(response) => response,
            Err(error) => {
                warn!("Malformed sign-in response: {error}");
                session.set_error(error.to_string());
                return Err(error.into());
            }
        };

        let credentials = Credentials::new(response.access_token.clone(), response.user.clone());
        {
            let _guard = self.ctx().persist_lock.lock().await;
            session.set_credentials(credentials.access_token.clone(), credentials.user.clone());
            self.persist(&credentials).await;
        }

        info!(user_id = %response.user.id, "Signed in");
        self.notify(SessionChange::LoggedIn);

        Ok(response)
    }

    /// Sign out.
    ///
    /// The API is told about it on a best-effort basis: whatever the outcome
    /// of that call, the local session and its persisted copy are gone
    /// afterwards and [`SessionChange::LoggedOut`] is broadcast.
    #[instrument(skip_all)]
    pub async fn logout(&self) {
        let access_token = self.client.session().access_token();
        let request = Request::post(self.ctx().endpoints.logout.as_str());

        if let Err(error) = self.client.send_inner(&request, None, access_token.as_deref()).await {
            warn!("Couldn't sign out on the server, clearing the local session anyway: {error}");
        }

        self.clear_session().await;
        info!("Signed out");
        self.notify(SessionChange::LoggedOut);
    }

    /// Ask the API for a new access token.
    ///
    /// The request carries no bearer token: the API identifies the session by
    /// its refresh cookie. On success the token is replaced, the user is
    /// kept, the session is persisted and [`SessionChange::TokensRefreshed`]
    /// is broadcast.
    ///
    /// Unless the client was built with
    /// [`ClientBuilder::coalesce_token_refreshes`], concurrent calls each
    /// send their own request. With it, callers arriving while a refresh is
    /// in flight wait for it and get its outcome.
    ///
    /// If the session is cleared, or another user signs in, while the request
    /// is in flight, the new token is dropped and
    /// [`RefreshTokenError::SessionCleared`] is returned.
    ///
    /// [`ClientBuilder::coalesce_token_refreshes`]: crate::ClientBuilder::coalesce_token_refreshes
    pub async fn refresh_access_token(&self) -> Result<(), RefreshTokenError> {
        let Some(refresh_token_lock) = &self.ctx().refresh_token_lock else {
            return self.refresh_access_token_inner().await;
        };

        let Ok(mut guard) = refresh_token_lock.try_lock() else {
            // Somebody else is also doing a token refresh; wait for it to finish first.
            return refresh_token_lock.lock().await.clone();
        };

        let result = self.refresh_access_token_inner().await;
        *guard = result.clone();
        result
    }

    #[instrument(skip_all)]
    async fn refresh_access_token_inner(&self) -> Result<(), RefreshTokenError> {
        let session = self.client.session();
        let generation = session.generation();
        let Some(credentials) = session.credentials() else {
            return Err(RefreshTokenError::RefreshTokenRequired);
        };

        let request = Request::get(self.ctx().endpoints.refresh_token.as_str());
        let response = match self.client.send_inner(&request, None, None).await {
            Ok(response) => response,
            Err(HttpError::Api(error)) => {
                warn!(status = %error.status, "The refresh request was rejected");
                return Err(RefreshTokenError::Rejected { status: error.status });
            }
            Err(error) => {
                warn!("The refresh request failed: {error}");
                return Err(RefreshTokenError::Transport(error.to_string()));
            }
        };

        let access_token = match response.json::<RefreshTokenResponse>() {
            Ok(response) if !response.access_token.is_empty() => response.access_token,
            Ok(_) => {
                return Err(RefreshTokenError::MalformedResponse(
                    "the access token is empty".to_owned(),
                ));
            }
            Err(error) => return Err(RefreshTokenError::MalformedResponse(error.to_string())),
        };

        self.store_refreshed_token(generation, access_token, credentials.user).await?;

        debug!("Access token refreshed");
        self.notify(SessionChange::TokensRefreshed);

        Ok(())
    }

    async fn store_refreshed_token(
        &self,
        generation: SessionGeneration,
        access_token: String,
        user: UserIdentity,
    ) -> Result<(), RefreshTokenError> {
        let _guard = self.ctx().persist_lock.lock().await;

        let credentials = Credentials::new(access_token, user);
        let session = self.client.session();
        if !session.set_credentials_if_generation(
            generation,
            credentials.access_token.clone(),
            credentials.user.clone(),
        ) {
            info!("The session changed during the refresh, dropping the new token");
            return Err(RefreshTokenError::SessionCleared);
        }

        self.persist(&credentials).await;
        Ok(())
    }

    /// Ask the API whether `access_token` is still accepted.
    ///
    /// This never goes through the refresh cycle. Any non-2xx answer, or a
    /// 2xx answer saying `"valid": false`, means the token is invalid; only
    /// a failure to reach the API is an error.
    #[instrument(skip_all)]
    pub async fn validate_session(&self, access_token: &str) -> HttpResult<SessionValidation> {
        let request = Request::get(self.ctx().endpoints.validate.as_str());

        match self.client.send_inner(&request, None, Some(access_token)).await {
            Ok(response) => {
                let body = match response.json::<Option<ValidateResponse>>() {
                    Ok(body) => body,
                    Err(error) => {
                        debug!("Ignoring unexpected validation body: {error}");
                        None
                    }
                };

                match body {
                    Some(ValidateResponse { valid: Some(false), .. }) => {
                        Ok(SessionValidation::Invalid { status: response.status() })
                    }
                    Some(ValidateResponse { user, .. }) => Ok(SessionValidation::Valid { user }),
                    None => Ok(SessionValidation::Valid { user: None }),
                }
            }
            Err(HttpError::Api(error)) => Ok(SessionValidation::Invalid { status: error.status }),
            Err(error) => Err(error),
        }
    }

    /// Restore the persisted session, if the API still accepts it.
    ///
    /// Meant to be called once at startup. Concurrent callers share a single
    /// restore: the later ones wait for the first and get its outcome.
    ///
    /// * Nothing persisted: the session stays empty.
    /// * The token is accepted: the session is restored, with the newer
    ///   identity if the API sent one.
    /// * The token is rejected: the persisted copy is removed.
    /// * The API can't be reached: the session stays empty, the persisted copy
    ///   is kept for the next attempt and the session error is set.
    ///
    /// Loading is always over when this returns.
    #[instrument(skip(self))]
    pub async fn initialize_auth(&self) -> SessionStatus {
        let init_lock = &self.ctx().init_lock;
        let Ok(mut guard) = init_lock.try_lock() else {
            // Somebody else is already restoring the session; wait for it to finish first.
            let outcome = *init_lock.lock().await;
            return outcome.unwrap_or_else(|| self.client.session().status());
        };

        let status = self.initialize_auth_inner().await;
        *guard = Some(status);
        status
    }

    async fn initialize_auth_inner(&self) -> SessionStatus {
        let session = self.client.session();
        let generation = session.generation();
        if session.is_authenticated() {
            debug!("Already signed in, nothing to restore");
            return SessionStatus::Authenticated;
        }

        let stored = match self.client.state_store().load_session().await {
            Ok(stored) => stored,
            Err(error) => {
                warn!("Couldn't load the persisted session, discarding it: {error}");
                if let Err(error) = self.client.state_store().clear_session().await {
                    error!("Couldn't remove the persisted session: {error}");
                }
                None
            }
        };

        let Some(stored) = stored else {
            debug!("No persisted session");
            return session.status();
        };

        let _loading = LoadingGuard::new(session);

        match self.validate_session(&stored.access_token).await {
            Ok(SessionValidation::Valid { user }) => {
                let user_changed = user.as_ref().is_some_and(|user| *user != stored.user);
                let credentials =
                    Credentials::new(stored.access_token, user.unwrap_or(stored.user));

                let _guard = self.ctx().persist_lock.lock().await;
                if !session.set_credentials_if_generation(
                    generation,
                    credentials.access_token.clone(),
                    credentials.user.clone(),
                ) {
                    info!("The session changed during the restore, keeping the new one");
                    return session.status();
                }

                if user_changed {
                    self.persist(&credentials).await;
                }

                info!(user_id = %credentials.user.id, "Session restored");
                SessionStatus::Authenticated
            }
            Ok(SessionValidation::Invalid { status }) => {
                info!(%status, "The persisted session is no longer valid");
                if !self.clear_session_if_generation(generation).await {
                    info!("A new session started during the restore, keeping it");
                }
                session.status()
            }
            Err(error) => {
                warn!("Couldn't validate the persisted session: {error}");
                if session.generation() == generation {
                    session.set_error(error.to_string());
                }
                session.status()
            }
        }
    }

    /// Where the signed-in user should land, according to their role.
    ///
    /// `None` if nobody is signed in.
    pub fn home_path(&self) -> Option<&'static str> {
        self.client.session().user().map(|user| user.role.home_path())
    }

    /// Drop the session after a failed refresh and send the user to the
    /// sign-in screen.
    ///
    /// Nothing happens if the session changed since `generation` was read.
    pub(crate) async fn invalidate_session(&self, generation: SessionGeneration) {
        if !self.clear_session_if_generation(generation).await {
            info!("The session changed since the refresh started, keeping it");
            return;
        }

        warn!("The session is no longer valid");
        self.notify(SessionChange::SessionInvalid);
        self.client.redirect_to_sign_in();
    }

    async fn clear_session(&self) {
        let _guard = self.ctx().persist_lock.lock().await;
        self.client.session().clear_credentials();
        if let Err(error) = self.client.state_store().clear_session().await {
            error!("Couldn't remove the persisted session: {error}");
        }
    }

    async fn clear_session_if_generation(&self, generation: SessionGeneration) -> bool {
        let _guard = self.ctx().persist_lock.lock().await;
        if !self.client.session().clear_credentials_if_generation(generation) {
            return false;
        }

        if let Err(error) = self.client.state_store().clear_session().await {
            error!("Couldn't remove the persisted session: {error}");
        }
        true
    }

    /// Must be called with the persist lock held.
    async fn persist(&self, credentials: &Credentials) {
        if let Err(error) = self.client.state_store().save_session(credentials).await {
            error!("Couldn't persist the session: {error}");
        }
    }
}

/// Flags the session as loading for as long as it lives.
struct LoadingGuard<'a>(&'a SessionStore);

impl<'a> LoadingGuard<'a> {
    fn new(session: &'a SessionStore) -> Self {
        session.set_loading(true);
        Self(session)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_loading(false);
    }
}
