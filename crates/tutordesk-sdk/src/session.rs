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

//! User session data.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The tokens of an authenticated user session.
///
/// Both tokens carry an absolute expiry timestamp computed client side: the
/// authentication server hands out opaque credentials without expiry
/// metadata, so the configured lifetimes are added to the wall clock at the
/// moment the tokens are received. A token and its expiry are always set
/// together.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionTokens {
    /// The bearer credential attached to outbound API calls.
    pub access_token: String,

    /// Point in time after which `access_token` must not be used.
    pub access_expiry: DateTime<Utc>,

    /// The credential used solely to obtain a new access token.
    pub refresh_token: String,

    /// Point in time after which the session cannot be renewed and must end.
    pub refresh_expiry: DateTime<Utc>,
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .finish_non_exhaustive()
    }
}

impl SessionTokens {
    /// Build session tokens from a pair of fresh credentials, stamping them
    /// with expiries relative to now.
    pub(crate) fn new(
        access_token: String,
        access_lifetime: Duration,
        refresh_token: String,
        refresh_lifetime: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            access_token,
            access_expiry: now + chrono::Duration::seconds(access_lifetime.as_secs() as i64),
            refresh_token,
            refresh_expiry: now + chrono::Duration::seconds(refresh_lifetime.as_secs() as i64),
        }
    }

    /// Replace the access token with a renewed one, stamping it with a fresh
    /// expiry. The refresh token is left untouched.
    pub(crate) fn update_with_renewal(&mut self, access_token: String, access_lifetime: Duration) {
        self.access_token = access_token;
        self.access_expiry =
            Utc::now() + chrono::Duration::seconds(access_lifetime.as_secs() as i64);
    }

    /// Whether the access token expires within the given lead time.
    pub fn access_expires_within(&self, lead_time: Duration) -> bool {
        let threshold = Utc::now() + chrono::Duration::seconds(lead_time.as_secs() as i64);
        self.access_expiry <= threshold
    }

    /// Whether the refresh token has passed its expiry.
    pub fn refresh_expired(&self) -> bool {
        self.refresh_expiry <= Utc::now()
    }
}
