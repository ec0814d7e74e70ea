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

//! Error conditions.

use std::fmt;

use as_variant::as_variant;
use bytes::Bytes;
use http::StatusCode;
use reqwest::Error as ReqwestError;
use serde::Deserialize;
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// Result type of the coop-sdk.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Result type of a pure HTTP request.
pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// A non-2xx response from the API.
#[derive(Clone, Error)]
#[error("the server responded with {status}: {}", self.message.as_deref().unwrap_or("no message"))]
pub struct ApiError {
    /// The status code of the response.
    pub status: StatusCode,
    /// The human readable message the API sent along, if any.
    pub message: Option<String>,
    /// The raw response body.
    pub body: Bytes,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: Option<String>,
}

impl ApiError {
    /// Create an `ApiError` from a status code and raw body.
    ///
    /// The message is taken from a `message` (or `error`) string field of a
    /// JSON body, if there is one.
    pub fn new(status: StatusCode, body: Bytes) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(&body).ok().and_then(|b| b.message);
        Self { status, message, body }
    }

    /// The message to show to the user: the API's own message, or the
    /// canonical reason of the status code.
    pub fn display_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.status.canonical_reason().map(ToOwned::to_owned))
            .unwrap_or_else(|| self.status.to_string())
    }
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiError")
            .field("status", &self.status)
            .field("message", &self.message)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// An HTTP error, representing either a connection error or an error
/// response of the API.
#[derive(Error, Debug)]
pub enum HttpError {
    /// An error at the HTTP layer.
    #[error(transparent)]
    Reqwest(#[from] ReqwestError),

    /// The API answered with a non-2xx status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The body of a successful response couldn't be deserialized.
    #[error(transparent)]
    Json(#[from] JsonError),

    /// The request URL couldn't be built.
    #[error(transparent)]
    Url(#[from] UrlParseError),

    /// The HTTP request couldn't be built.
    #[error(transparent)]
    Http(#[from] http::Error),

    /// The access token expired and couldn't be refreshed.
    #[error(transparent)]
    RefreshToken(#[from] RefreshTokenError),
}

impl HttpError {
    /// If `self` is <code>[Api](Self::Api)(e)</code>, returns `Some(e)`.
    ///
    /// Otherwise, returns `None`.
    pub fn as_api_error(&self) -> Option<&ApiError> {
        as_variant!(self, Self::Api)
    }

    /// The status code of the API response, if this is an API error.
    pub fn status(&self) -> Option<StatusCode> {
        self.as_api_error().map(|e| e.status)
    }

    /// Whether the API rejected the request's authorization.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// All the ways refreshing the access token can fail.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RefreshTokenError {
    /// Nobody is signed in, so there is no session to refresh.
    #[error("there is no session to refresh")]
    RefreshTokenRequired,

    /// The refresh request didn't reach the API.
    #[error("the refresh request failed: {0}")]
    Transport(String),

    /// The API refused to issue a new access token.
    #[error("the refresh request was rejected with {status}")]
    Rejected {
        /// The status code of the refresh response.
        status: StatusCode,
    },

    /// The refresh response didn't contain a usable access token.
    #[error("the refresh response is malformed: {0}")]
    MalformedResponse(String),

    /// The session was cleared or replaced while the refresh was in flight.
    #[error("the session changed while refreshing the access token")]
    SessionCleared,
}

/// Internal representation of errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error doing an HTTP request.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The API refused the email and password.
    #[error("{message}")]
    CredentialRejected {
        /// The status code of the login response.
        status: StatusCode,
        /// The message of the API, to be shown as is.
        message: String,
    },
}

impl From<RefreshTokenError> for Error {
    fn from(error: RefreshTokenError) -> Self {
        HttpError::from(error).into()
    }
}

impl Error {
    /// If `self` is an HTTP error, returns it.
    pub fn as_http_error(&self) -> Option<&HttpError> {
        as_variant!(self, Self::Http)
    }
}
