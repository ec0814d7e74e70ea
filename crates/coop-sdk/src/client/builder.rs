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

use std::{env, fmt, sync::Arc, time::Duration};

use coop_sdk_base::{
    store::{MemoryStore, SharedStateStore, StateStore},
    SessionStore,
};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::{Client, ClientInner};
use crate::{
    authentication::{AuthCtx, AuthEndpoints},
    config::RequestConfig,
    http_client::{HttpClient, HttpSend, DEFAULT_REQUEST_TIMEOUT},
    navigation::{Navigator, NoopNavigator, DEFAULT_SIGN_IN_PATH},
};

/// The environment variable [`ClientBuilder::from_env`] reads the base URL
/// from.
pub const BASE_URL_ENV_VAR: &str = "COOP_API_BASE_URL";

/// Builder that allows creating and configuring various parts of a
/// [`Client`].
///
/// When setting the `StateStore` it is up to the user to open/connect
/// the storage backend before client creation.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use coop_sdk::{navigation::RecordingNavigator, Client};
///
/// let client_builder = Client::builder()
///     .base_url("https://coop.example.org/api")
///     .user_agent("coop-admin/1.0")
///     .navigator(Arc::new(RecordingNavigator::new()))
///     .coalesce_token_refreshes();
/// # let _ = client_builder.build().unwrap();
/// ```
#[must_use]
#[derive(Clone)]
pub struct ClientBuilder {
    base_url: Option<String>,
    http_cfg: Option<HttpConfig>,
    request_config: RequestConfig,
    state_store: Option<SharedStateStore>,
    session_store: Option<SessionStore>,
    navigator: Option<Arc<dyn Navigator>>,
    endpoints: AuthEndpoints,
    sign_in_path: String,
    coalesce_token_refreshes: bool,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self {
            base_url: None,
            http_cfg: None,
            request_config: Default::default(),
            state_store: None,
            session_store: None,
            navigator: None,
            endpoints: AuthEndpoints::default(),
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_owned(),
            coalesce_token_refreshes: false,
        }
    }

    /// Create a builder with the base URL taken from the
    /// `COOP_API_BASE_URL` environment variable.
    pub fn from_env() -> Result<Self, ClientBuildError> {
        let base_url = env::var(BASE_URL_ENV_VAR)?;
        Ok(Self::new().base_url(base_url))
    }

    /// Set the URL every request path is relative to.
    ///
    /// A path component is kept: with `https://coop.example.org/api`, the
    /// sign-in goes to `https://coop.example.org/api/login`.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = Some(url.as_ref().to_owned());
        self
    }

    /// Set the user agent of the default HTTP client.
    pub fn user_agent(mut self, user_agent: impl AsRef<str>) -> Self {
        self.http_settings().user_agent = Some(user_agent.as_ref().to_owned());
        self
    }

    /// Set the overall timeout of the default HTTP client.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_settings().timeout = timeout;
        self
    }

    /// Use the given `reqwest::Client` instead of the default one.
    ///
    /// Without a cookie store on that client, the refresh cookie is never
    /// sent back and token refreshes fail.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_cfg = Some(HttpConfig::Custom(Arc::new(client)));
        self
    }

    /// Use a custom implementation of [`HttpSend`] to talk to the API.
    pub fn custom_http_client(mut self, client: Arc<dyn HttpSend>) -> Self {
        self.http_cfg = Some(HttpConfig::Custom(client));
        self
    }

    /// Set the default timeout and concurrency limit of requests.
    pub fn request_config(mut self, request_config: RequestConfig) -> Self {
        self.request_config = request_config;
        self
    }

    /// Persist the session in the given store. Defaults to a
    /// [`MemoryStore`].
    pub fn state_store(mut self, store: impl StateStore + 'static) -> Self {
        self.state_store = Some(Arc::new(store));
        self
    }

    /// Persist the session in the given shared store.
    pub fn shared_state_store(mut self, store: SharedStateStore) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Use an existing [`SessionStore`], for instance one the UI already
    /// observes.
    pub fn session_store(mut self, session: SessionStore) -> Self {
        self.session_store = Some(session);
        self
    }

    /// Set the router the client asks to show the sign-in screen.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Override the paths of the authentication endpoints.
    pub fn endpoints(mut self, endpoints: AuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Set the path of the sign-in screen. Defaults to `/login`.
    pub fn sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    /// Let concurrent token refreshes share a single request.
    ///
    /// By default every request rejected with a 401 triggers its own refresh.
    pub fn coalesce_token_refreshes(mut self) -> Self {
        self.coalesce_token_refreshes = true;
        self
    }

    fn http_settings(&mut self) -> &mut HttpSettings {
        self.http_cfg.get_or_insert_with(Default::default).settings()
    }

    /// Create a [`Client`] with the options set on this builder.
    ///
    /// # Errors
    ///
    /// This method can fail for two general reasons:
    ///
    /// * Invalid configuration: The base URL is missing or invalid.
    ///
    /// * The default HTTP client couldn't be created.
    pub fn build(self) -> Result<Client, ClientBuildError> {
        let base_url = self.base_url.ok_or(ClientBuildError::MissingBaseUrl)?;
        let base_url = Url::parse(&base_url)?;

        let inner_http_client: Arc<dyn HttpSend> = match self.http_cfg.unwrap_or_default() {
            HttpConfig::Settings(settings) => Arc::new(settings.make_client()?),
            HttpConfig::Custom(client) => client,
        };
        let http_client = HttpClient::new(inner_http_client, self.request_config);

        debug!(base_url = base_url.as_str(), "Building the client");

        let inner = Arc::new(ClientInner {
            base_url,
            http_client,
            session: self.session_store.unwrap_or_default(),
            state_store: self.state_store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            navigator: self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator)),
            sign_in_path: self.sign_in_path,
            auth_ctx: AuthCtx::new(self.endpoints, self.coalesce_token_refreshes),
        });

        Ok(Client { inner })
    }
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("request_config", &self.request_config)
            .field("endpoints", &self.endpoints)
            .field("sign_in_path", &self.sign_in_path)
            .field("coalesce_token_refreshes", &self.coalesce_token_refreshes)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
enum HttpConfig {
    Settings(HttpSettings),
    Custom(Arc<dyn HttpSend>),
}

impl HttpConfig {
    fn settings(&mut self) -> &mut HttpSettings {
        if let Self::Custom(_) = self {
            *self = Self::default();
        }

        match self {
            Self::Settings(s) => s,
            Self::Custom(_) => unreachable!(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::Settings(HttpSettings::default())
    }
}

#[derive(Clone, Debug)]
struct HttpSettings {
    user_agent: Option<String>,
    timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { user_agent: None, timeout: DEFAULT_REQUEST_TIMEOUT }
    }
}

impl HttpSettings {
    /// Build a client with the specified configuration.
    fn make_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let user_agent = self
            .user_agent
            .clone()
            .unwrap_or_else(|| concat!("coop-sdk/", env!("CARGO_PKG_VERSION")).to_owned());

        reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(self.timeout)
            // The refresh credential lives in an HTTP-only cookie.
            .cookie_store(true)
            .build()
    }
}

/// Errors that can happen in [`ClientBuilder::build`].
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// No base URL was configured.
    #[error("no base URL was configured")]
    MissingBaseUrl,

    /// An error encountered when trying to parse the base URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// The default HTTP client couldn't be created.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// The base URL couldn't be read from the environment.
    #[error("couldn't read COOP_API_BASE_URL: {0}")]
    EnvVar(#[from] env::VarError),
}
