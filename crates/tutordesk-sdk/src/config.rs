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

//! Configuration for the session manager.

use std::{fmt, time::Duration};

use url::Url;

/// How long a freshly issued access token is considered usable.
pub const DEFAULT_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// How long a freshly issued refresh token is considered usable.
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Cadence of the periodic session check while authenticated.
pub const DEFAULT_RENEWAL_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Remaining access-token lifetime below which the periodic check renews
/// immediately instead of waiting for natural expiry.
pub const DEFAULT_RENEWAL_LEAD_TIME: Duration = Duration::from_secs(60);

/// Default timeout for requests to the authentication server.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a [`SessionManager`].
///
/// The token lifetimes are fixed at construction: the authentication server
/// does not communicate expiries, so the client computes absolute expiry
/// timestamps by adding the configured lifetimes to the current time on
/// every login and renewal.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tutordesk_sdk::config::SessionConfig;
/// use url::Url;
///
/// let config = SessionConfig::new(Url::parse("https://api.example.com").unwrap())
///     .access_token_lifetime(Duration::from_secs(10 * 60))
///     .renewal_check_interval(Duration::from_secs(15));
/// ```
///
/// [`SessionManager`]: crate::SessionManager
#[derive(Clone)]
pub struct SessionConfig {
    pub(crate) auth_server_url: Url,
    pub(crate) access_token_lifetime: Duration,
    pub(crate) refresh_token_lifetime: Duration,
    pub(crate) renewal_check_interval: Duration,
    pub(crate) renewal_lead_time: Duration,
    pub(crate) request_timeout: Duration,
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for SessionConfig {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            auth_server_url,
            access_token_lifetime,
            refresh_token_lifetime,
            renewal_check_interval,
            renewal_lead_time,
            request_timeout,
        } = self;

        fmt.debug_struct("SessionConfig")
            .field("auth_server_url", auth_server_url)
            .field("access_token_lifetime", access_token_lifetime)
            .field("refresh_token_lifetime", refresh_token_lifetime)
            .field("renewal_check_interval", renewal_check_interval)
            .field("renewal_lead_time", renewal_lead_time)
            .field("request_timeout", request_timeout)
            .finish()
    }
}

impl SessionConfig {
    /// Create a new `SessionConfig` for the given authentication server,
    /// with default lifetimes and timings.
    #[must_use]
    pub fn new(auth_server_url: Url) -> Self {
        Self {
            auth_server_url,
            access_token_lifetime: DEFAULT_ACCESS_TOKEN_LIFETIME,
            refresh_token_lifetime: DEFAULT_REFRESH_TOKEN_LIFETIME,
            renewal_check_interval: DEFAULT_RENEWAL_CHECK_INTERVAL,
            renewal_lead_time: DEFAULT_RENEWAL_LEAD_TIME,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the lifetime assigned to access tokens returned by the server.
    #[must_use]
    pub fn access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    /// Set the lifetime assigned to refresh tokens returned by the server.
    #[must_use]
    pub fn refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }

    /// Set the cadence of the periodic session check.
    #[must_use]
    pub fn renewal_check_interval(mut self, interval: Duration) -> Self {
        self.renewal_check_interval = interval;
        self
    }

    /// Set the remaining access-token lifetime below which the periodic
    /// check triggers a renewal.
    #[must_use]
    pub fn renewal_lead_time(mut self, lead_time: Duration) -> Self {
        self.renewal_lead_time = lead_time;
        self
    }

    /// Set the timeout for requests to the authentication server.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
