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
    fmt::Debug,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue,
};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, field::debug, instrument, trace};
use url::Url;

use crate::{
    config::RequestConfig,
    error::{ApiError, HttpError, HttpResult},
};

mod request;

pub use self::request::{PendingRequest, Request, Response};

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Abstraction around the http layer. This allows implementors to use different
/// http libraries.
#[async_trait]
pub trait HttpSend: Debug + Send + Sync {
    /// The method abstracting sending a request and receiving its response.
    ///
    /// This is called by the client every time it wants to send anything to
    /// the API, including the token refresh itself. Non-2xx responses must be
    /// returned as responses, not as errors.
    ///
    /// # Arguments
    ///
    /// * `request` - The fully built http request, with the bearer token
    ///   already attached.
    ///
    /// * `timeout` - A timeout for the full request > response cycle.
    async fn send_request(
        &self,
        request: http::Request<Bytes>,
        timeout: Duration,
    ) -> Result<http::Response<Bytes>, HttpError>;
}

#[derive(Clone, Debug)]
struct MaybeSemaphore(Arc<Option<Semaphore>>);

#[allow(dead_code)] // false-positive lint: we never use it but only hold it for the drop
struct MaybeSemaphorePermit<'a>(Option<SemaphorePermit<'a>>);

impl MaybeSemaphore {
    fn new(max: Option<NonZeroUsize>) -> Self {
        let inner = max.map(|i| Semaphore::new(i.into()));
        MaybeSemaphore(Arc::new(inner))
    }

    async fn acquire(&self) -> MaybeSemaphorePermit<'_> {
        match self.0.as_ref() {
            // The semaphore is never closed.
            Some(inner) => MaybeSemaphorePermit(inner.acquire().await.ok()),
            None => MaybeSemaphorePermit(None),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct HttpClient {
    pub(crate) inner: Arc<dyn HttpSend>,
    pub(crate) request_config: RequestConfig,
    concurrent_request_semaphore: MaybeSemaphore,
    next_request_id: Arc<AtomicU64>,
}

impl HttpClient {
    pub(crate) fn new(inner: Arc<dyn HttpSend>, request_config: RequestConfig) -> Self {
        HttpClient {
            inner,
            request_config,
            concurrent_request_semaphore: MaybeSemaphore::new(
                request_config.max_concurrent_requests,
            ),
            next_request_id: AtomicU64::new(0).into(),
        }
    }

    fn get_request_id(&self) -> String {
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        format!("REQ-{request_id}")
    }

    fn serialize_request(
        &self,
        request: &Request,
        base_url: &Url,
        access_token: Option<&str>,
    ) -> HttpResult<http::Request<Bytes>> {
        trace!(path = request.path(), "Serializing request");

        let url = endpoint_url(base_url, request.path())?;
        let body = match request.body() {
            Some(body) => Bytes::from(serde_json::to_vec(body)?),
            None => Bytes::new(),
        };

        let mut http_request = http::Request::new(body);
        *http_request.method_mut() = request.method().clone();
        *http_request.uri_mut() = url.as_str().parse().map_err(http::Error::from)?;

        let headers = http_request.headers_mut();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if request.body().is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        for (name, value) in request.headers() {
            headers.append(name, value.clone());
        }

        if let Some(access_token) = access_token {
            let mut value = HeaderValue::try_from(format!("Bearer {access_token}"))
                .map_err(http::Error::from)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(http_request)
    }

    /// Send the request once, with the given bearer token.
    ///
    /// Non-2xx responses become [`HttpError::Api`].
    #[instrument(
        skip(self, request, config, base_url, access_token),
        fields(config, uri, method, request_id, request_size, status, response_size)
    )]
    pub(crate) async fn send(
        &self,
        request: &Request,
        config: Option<RequestConfig>,
        base_url: &Url,
        access_token: Option<&str>,
    ) -> HttpResult<Response> {
        let config = match config {
            Some(config) => config,
            None => self.request_config,
        };

        let request = {
            let request_id = self.get_request_id();
            let span = tracing::Span::current();

            span.record("config", debug(config)).record("request_id", request_id);

            let request = self.serialize_request(request, base_url, access_token)?;

            // The query may carry personal data.
            let mut uri = request.uri().clone().into_parts();
            let path = uri.path_and_query.as_ref().and_then(|p| p.path().parse().ok());
            uri.path_and_query = path;
            let uri = http::Uri::from_parts(uri).map(|uri| uri.to_string()).unwrap_or_default();

            span.record("method", debug(request.method())).record("uri", uri);
            if !request.body().is_empty() {
                span.record("request_size", request.body().len());
            }

            request
        };

        // will be automatically dropped at the end of this function
        let _handle = self.concurrent_request_semaphore.acquire().await;

        match self.inner.send_request(request, config.timeout).await {
            Ok(response) => {
                let span = tracing::Span::current();
                span.record("status", response.status().as_u16())
                    .record("response_size", response.body().len());

                if response.status().is_success() {
                    debug!("Got response");
                    Ok(Response::from_http(response))
                } else {
                    let (parts, body) = response.into_parts();
                    let error = ApiError::new(parts.status, body);
                    debug!("Got error response: {error}");
                    Err(error.into())
                }
            }
            Err(e) => {
                debug!("Error while sending request: {e:?}");
                Err(e)
            }
        }
    }
}

/// Join a request path onto the base URL, keeping the base URL's own path.
fn endpoint_url(base_url: &Url, path: &str) -> HttpResult<Url> {
    let base = base_url.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

async fn response_to_http_response(
    mut response: reqwest::Response,
) -> Result<http::Response<Bytes>, reqwest::Error> {
    let status = response.status();
    let headers = std::mem::take(response.headers_mut());
    let body = response.bytes().await?;

    let mut http_response = http::Response::new(body);
    *http_response.status_mut() = status;
    *http_response.headers_mut() = headers;

    Ok(http_response)
}

#[async_trait]
impl HttpSend for reqwest::Client {
    async fn send_request(
        &self,
        request: http::Request<Bytes>,
        timeout: Duration,
    ) -> Result<http::Response<Bytes>, HttpError> {
        let mut request = reqwest::Request::try_from(request)?;
        *request.timeout_mut() = Some(timeout);

        let response = self.execute(request).await?;
        Ok(response_to_http_response(response).await?)
    }
}
