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
    fmt::{self, Debug},
    sync::Arc,
};

use coop_sdk_base::{
    store::{DynStateStore, SharedStateStore},
    SessionStore,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    authentication::{Auth, AuthCtx},
    config::RequestConfig,
    error::{HttpResult, RefreshTokenError},
    http_client::{HttpClient, PendingRequest, Request, Response},
    navigation::{is_at_path, Navigator},
};

mod builder;

pub use self::builder::{ClientBuildError, ClientBuilder};

/// A change of the session, as broadcast by
/// [`Client::subscribe_to_session_changes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    /// A user signed in.
    LoggedIn,
    /// The access token was replaced by a fresh one.
    TokensRefreshed,
    /// The user signed out.
    LoggedOut,
    /// The access token expired and couldn't be refreshed, the session was
    /// dropped.
    SessionInvalid,
}

/// An async/await enabled client for the cooperative API.
///
/// All clones of a `Client` share the same session. Every request sent through
/// [`Client::send`] carries the current access token, and a request rejected
/// with a 401 is replayed once after a token refresh.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    /// The URL every request path is relative to.
    base_url: Url,
    /// The underlying HTTP client.
    http_client: HttpClient,
    /// The authoritative session state.
    session: SessionStore,
    /// The persisted copy of the session.
    state_store: SharedStateStore,
    /// The host's router.
    navigator: Arc<dyn Navigator>,
    /// Where to send the user once the session is gone.
    sign_in_path: String,
    /// Authentication data.
    pub(crate) auth_ctx: AuthCtx,
}

#[cfg(not(tarpaulin_include))]
impl Debug for Client {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new [`Client`] for the API at the given base URL, with the
    /// default configuration.
    pub fn new(base_url: &str) -> Result<Self, ClientBuildError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The URL every request path is relative to.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The session shared by all clones of this client.
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// The persisted copy of the session.
    pub fn state_store(&self) -> &DynStateStore {
        &*self.inner.state_store
    }

    /// Sign in, sign out, refresh and restore the session.
    pub fn auth(&self) -> Auth {
        Auth::new(self.clone())
    }

    /// The path of the sign-in screen.
    pub fn sign_in_path(&self) -> &str {
        &self.inner.sign_in_path
    }

    /// Subscribe to changes of the session.
    ///
    /// The session state itself can be observed with
    /// [`SessionStore::subscribe`]; this only reports what happened to it.
    pub fn subscribe_to_session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.inner.auth_ctx.session_change_sender.subscribe()
    }

    /// Send an arbitrary request to the API, and get back the response.
    ///
    /// The current access token, if any, is attached to the request. If the
    /// API rejects it with a 401, the token is refreshed once and the request
    /// is sent again with the new token. A second 401 is returned as is. If
    /// the refresh itself fails, the session the request was sent with is
    /// dropped and the user is sent to the sign-in screen.
    ///
    /// Any other non-2xx status is returned as [`HttpError::Api`](crate::HttpError::Api).
    ///
    /// # Arguments
    ///
    /// * `request` - The request to send.
    ///
    /// * `config` - Optional configuration for the request, overriding the
    ///   client's default one.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use coop_sdk::{Client, Request};
    /// # async {
    /// let client = Client::new("https://coop.example.org/api")?;
    ///
    /// let response = client.send(Request::get("/api/loan"), None).await?;
    /// println!("{}", response.text());
    /// # Ok::<(), Box<dyn std::error::Error>>(()) };
    /// ```
    #[instrument(skip_all, fields(method = %request.method(), path = request.path()))]
    pub async fn send(
        &self,
        request: Request,
        config: Option<RequestConfig>,
    ) -> HttpResult<Response> {
        let mut pending = PendingRequest::new(request);

        loop {
            let generation = self.session().generation();
            let access_token = self.session().access_token();
            let error = match self.send_inner(&pending.request, config, access_token.as_deref()).await
            {
                Err(error) if error.is_unauthorized() => error,
                result => return result,
            };

            if !self.session().is_authenticated() {
                debug!("Unauthorized without a session, nothing to refresh");
                return Err(error);
            }

            let Some(retry) = pending.into_retry() else {
                warn!("Still unauthorized after a token refresh, giving up");
                return Err(error);
            };

            debug!("Unauthorized, refreshing the access token");
            match self.auth().refresh_access_token().await {
                Ok(()) => pending = retry,
                Err(
                    refresh_error @ (RefreshTokenError::SessionCleared
                    | RefreshTokenError::RefreshTokenRequired),
                ) => {
                    // Signed out, or signed in again, in the meantime.
                    return Err(refresh_error.into());
                }
                Err(refresh_error) => {
                    self.auth().invalidate_session(generation).await;
                    return Err(refresh_error.into());
                }
            }
        }
    }

    /// Send the request once, outside of the refresh cycle.
    pub(crate) async fn send_inner(
        &self,
        request: &Request,
        config: Option<RequestConfig>,
        access_token: Option<&str>,
    ) -> HttpResult<Response> {
        self.inner.http_client.send(request, config, &self.inner.base_url, access_token).await
    }

    /// `GET` a JSON resource.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> HttpResult<T> {
        self.send(Request::get(path), None).await?.json()
    }

    /// `POST` a JSON body, and read the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> HttpResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = Request::post(path).json(serde_json::to_value(body)?);
        self.send(request, None).await?.json()
    }

    /// `PUT` a JSON body, and read the JSON response.
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> HttpResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = Request::put(path).json(serde_json::to_value(body)?);
        self.send(request, None).await?.json()
    }

    /// `PATCH` a JSON body, and read the JSON response.
    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> HttpResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = Request::patch(path).json(serde_json::to_value(body)?);
        self.send(request, None).await?.json()
    }

    /// `DELETE` a resource.
    pub async fn delete(&self, path: &str) -> HttpResult<Response> {
        self.send(Request::delete(path), None).await
    }

    /// Send the user to the sign-in screen, unless they already are there.
    pub(crate) fn redirect_to_sign_in(&self) {
        let sign_in_path = self.sign_in_path();
        let navigator = &self.inner.navigator;

        if navigator.current_location().is_some_and(|location| is_at_path(&location, sign_in_path))
        {
            debug!("Already on the sign-in screen, not navigating");
            return;
        }

        info!(path = sign_in_path, "Navigating to the sign-in screen");
        navigator.navigate_to(sign_in_path);
    }
}
