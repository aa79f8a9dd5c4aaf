// Copyright 2025 The TutorDesk Authors
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

use reqwest::{Error as ReqwestError, StatusCode};
use serde_json::Error as JsonError;
use thiserror::Error;
use tutordesk_store_encryption::EncryptionError;
use url::ParseError as UrlParseError;

use crate::store::StoreError;

/// Result type of the tutordesk-sdk.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Result type of a pure HTTP request.
pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// An HTTP error, representing either a connection error or an error while
/// converting the raw HTTP response into an API response.
#[derive(Error, Debug)]
pub enum HttpError {
    /// An error at the HTTP layer.
    #[error(transparent)]
    Reqwest(#[from] ReqwestError),

    /// The server answered with a non-success status code.
    #[error("the server returned an error status: {0}")]
    Api(StatusCode),

    /// The response body could not be deserialized into the expected shape.
    #[error("the server returned a malformed response: {0}")]
    MalformedResponse(#[from] JsonError),

    /// An error occurred while renewing the access token.
    #[error(transparent)]
    RefreshToken(#[from] RefreshTokenError),
}

impl HttpError {
    /// If `self` is [`Api`](Self::Api), returns the status code the server
    /// answered with.
    ///
    /// Otherwise, returns `None`.
    pub fn api_status(&self) -> Option<StatusCode> {
        match self {
            Self::Api(status) => Some(*status),
            _ => None,
        }
    }
}

/// Internal representation of errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error doing an HTTP request.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// An error de/serializing a value.
    #[error(transparent)]
    SerdeJson(#[from] JsonError),

    /// An error occurred in the session store.
    #[error(transparent)]
    StateStore(#[from] StoreError),

    /// An error occurred while encrypting a credential for storage.
    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    /// An error encountered when trying to parse a url.
    #[error(transparent)]
    Url(#[from] UrlParseError),
}

impl From<ReqwestError> for Error {
    fn from(e: ReqwestError) -> Self {
        Error::Http(HttpError::Reqwest(e))
    }
}

impl From<RefreshTokenError> for Error {
    fn from(e: RefreshTokenError) -> Self {
        Error::Http(HttpError::RefreshToken(e))
    }
}

/// Errors that can happen when renewing an access token.
///
/// This type is cloneable so that callers waiting on a renewal that is
/// already in flight can observe the outcome of the call that actually hit
/// the endpoint.
#[derive(Debug, Error, Clone)]
pub enum RefreshTokenError {
    /// Tried to renew the access token while not holding a refresh token.
    #[error("missing refresh token")]
    RefreshTokenRequired,

    /// The refresh token itself has passed its expiry, the session cannot be
    /// renewed anymore.
    #[error("the refresh token has expired")]
    RefreshTokenExpired,

    /// The renewal endpoint rejected the refresh token.
    #[error("the server rejected the refresh token: {0}")]
    Rejected(StatusCode),

    /// The renewal call failed for another reason, the session cannot be
    /// renewed.
    #[error("unable to renew the access token")]
    UnableToRefreshToken,
}
