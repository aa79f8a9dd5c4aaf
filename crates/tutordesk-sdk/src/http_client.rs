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

//! The HTTP client talking to the authentication endpoints.

use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{HttpError, HttpResult, Result};

/// Path of the endpoint issuing a fresh token pair.
const CREATE_TOKEN_PATH: &str = "auth/jwt/create";

/// Path of the endpoint exchanging a refresh token for a new access token.
const REFRESH_TOKEN_PATH: &str = "auth/jwt/refresh";

/// Body of a `POST /auth/jwt/create` request.
#[derive(Debug, Serialize)]
pub(crate) struct CreateTokenRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body of a successful `POST /auth/jwt/create` response.
#[derive(Debug, Deserialize)]
pub(crate) struct CreateTokenResponse {
    pub access: String,
    pub refresh: String,
}

/// Body of a `POST /auth/jwt/refresh` request.
#[derive(Debug, Serialize)]
pub(crate) struct RefreshTokenRequest<'a> {
    pub refresh: &'a str,
}

/// Body of a successful `POST /auth/jwt/refresh` response.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshTokenResponse {
    pub access: String,
}

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    inner: reqwest::Client,
    create_token_url: Url,
    refresh_token_url: Url,
}

impl HttpClient {
    /// Create a client for the given authentication server.
    ///
    /// The endpoint URLs are resolved once here so that sending a request
    /// can't fail on URL construction.
    pub(crate) fn new(auth_server_url: &Url, timeout: Duration) -> Result<Self> {
        let inner =
            reqwest::Client::builder().timeout(timeout).build().map_err(HttpError::Reqwest)?;

        // `join` only fails on a degenerate base URL, surface that at
        // construction instead of on the first login.
        let create_token_url = auth_server_url.join(CREATE_TOKEN_PATH)?;
        let refresh_token_url = auth_server_url.join(REFRESH_TOKEN_PATH)?;

        Ok(Self { inner, create_token_url, refresh_token_url })
    }

    /// Send credentials to the token creation endpoint.
    pub(crate) async fn create_token(
        &self,
        username: &str,
        password: &str,
    ) -> HttpResult<CreateTokenResponse> {
        debug!(url = %self.create_token_url, "Requesting a new token pair");
        self.post_json(self.create_token_url.clone(), &CreateTokenRequest { username, password })
            .await
    }

    /// Exchange the refresh token for a new access token.
    pub(crate) async fn refresh_token(&self, refresh: &str) -> HttpResult<RefreshTokenResponse> {
        debug!(url = %self.refresh_token_url, "Renewing the access token");
        self.post_json(self.refresh_token_url.clone(), &RefreshTokenRequest { refresh }).await
    }

    async fn post_json<Request, Response>(&self, url: Url, body: &Request) -> HttpResult<Response>
    where
        Request: Serialize + ?Sized,
        Response: DeserializeOwned,
    {
        let response = self.inner.post(url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "Authentication request failed");
            return Err(HttpError::Api(status));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
