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

//! Requests and responses exchanged with the API.

use std::fmt;

use bytes::Bytes;
use http::{
    header::{HeaderName, HeaderValue},
    HeaderMap, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::HttpResult;

/// A request to one of the API's endpoints.
///
/// The path is relative to the base URL of the [`Client`](crate::Client). The
/// bearer token is never part of a `Request`; the client attaches the current
/// one every time the request goes out.
///
/// # Examples
///
/// ```
/// use coop_sdk::Request;
/// use serde_json::json;
///
/// let request = Request::post("/api/loan").json(json!({ "amount": 250000 }));
/// assert_eq!(request.path(), "/api/loan");
/// ```
#[derive(Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<JsonValue>,
}

impl Request {
    /// Create a request with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), headers: HeaderMap::new(), body: None }
    }

    /// Create a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Create a `PUT` request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Create a `PATCH` request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Create a `DELETE` request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set the JSON body of the request.
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header to the request.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path, relative to the base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The extra headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The JSON body, if any.
    pub fn body(&self) -> Option<&JsonValue> {
        self.body.as_ref()
    }
}

// Bodies carry passwords and personal data.
#[cfg(not(tarpaulin_include))]
impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// A request on its way through the client, remembering whether it was
/// already replayed after a token refresh.
///
/// The flag only ever goes from unset to set, which is what bounds the
/// refresh cycle to a single retry.
#[derive(Clone, Debug)]
pub struct PendingRequest {
    /// The request to send.
    pub request: Request,
    has_retried: bool,
}

impl PendingRequest {
    /// Wrap a request that hasn't been sent yet.
    pub fn new(request: Request) -> Self {
        Self { request, has_retried: false }
    }

    /// Whether this request is the replay of a request that was rejected
    /// with a 401.
    pub fn has_retried(&self) -> bool {
        self.has_retried
    }

    /// Turn this into its one replay, or `None` if it already is one.
    pub fn into_retry(self) -> Option<Self> {
        if self.has_retried {
            None
        } else {
            Some(Self { request: self.request, has_retried: true })
        }
    }
}

/// A successful response of the API.
#[derive(Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub(crate) fn from_http(response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Self { status: parts.status, headers: parts.headers, body }
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The raw body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the JSON body.
    ///
    /// An empty body deserializes as JSON `null`, so it can be read into an
    /// `Option` or `()`.
    pub fn json<T: DeserializeOwned>(&self) -> HttpResult<T> {
        if self.body.is_empty() {
            return Ok(serde_json::from_value(JsonValue::Null)?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}
