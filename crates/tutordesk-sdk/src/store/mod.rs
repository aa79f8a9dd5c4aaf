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

//! The persisted credential store.
//!
//! Credentials survive a restart through a small key-value surface, the
//! equivalent of the browser's local storage in the original deployment
//! target. Exactly four keys are used; they are written together on every
//! login and renewal and removed together on logout. Token values are
//! encrypted with the [`StoreCipher`] before they reach the store,
//! expirations are stored as RFC 3339 timestamps in the clear.

use std::fmt;

use async_trait::async_trait;
use chrono::DateTime;
use thiserror::Error;
use tracing::debug;
use tutordesk_store_encryption::StoreCipher;

use crate::session::SessionTokens;

mod memory_store;

pub use self::memory_store::MemoryStore;

/// Store key holding the encrypted access token.
pub const KEY_ACCESS_TOKEN: &str = "token";

/// Store key holding the access token expiry as an RFC 3339 timestamp.
pub const KEY_ACCESS_EXPIRATION: &str = "expiration";

/// Store key holding the encrypted refresh token.
pub const KEY_REFRESH_TOKEN: &str = "refresh";

/// Store key holding the refresh token expiry as an RFC 3339 timestamp.
pub const KEY_REFRESH_EXPIRATION: &str = "refreshExpiration";

/// Every credential key, in persistence order.
pub const ALL_KEYS: [&str; 4] =
    [KEY_ACCESS_TOKEN, KEY_ACCESS_EXPIRATION, KEY_REFRESH_TOKEN, KEY_REFRESH_EXPIRATION];

/// Error type for session store operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// An error happened in the underlying store backend.
    #[error("error in the session store backend: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Create a new [`Backend`][Self::Backend] error.
    ///
    /// Store implementations should use this for any error not covered by a
    /// more specific variant.
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }
}

/// An abstract key-value store the session manager persists credentials to.
///
/// Implementations only need to provide string storage; the session manager
/// takes care of encryption and of keeping the four credential keys
/// consistent with each other.
#[async_trait]
pub trait SessionStore: fmt::Debug + Send + Sync {
    /// Get the value stored under the given key, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a value under the given key, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove the value stored under the given key, if any.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Write the given tokens to the store, encrypted.
///
/// All four keys are written; a partially persisted session is never left
/// behind on success.
pub(crate) async fn save_session(
    store: &dyn SessionStore,
    cipher: &StoreCipher,
    tokens: &SessionTokens,
) -> crate::Result<()> {
    let access = cipher.encrypt_str(&tokens.access_token)?;
    let refresh = cipher.encrypt_str(&tokens.refresh_token)?;

    store.set(KEY_ACCESS_TOKEN, access).await?;
    store.set(KEY_ACCESS_EXPIRATION, tokens.access_expiry.to_rfc3339()).await?;
    store.set(KEY_REFRESH_TOKEN, refresh).await?;
    store.set(KEY_REFRESH_EXPIRATION, tokens.refresh_expiry.to_rfc3339()).await?;

    Ok(())
}

/// Read a persisted session back from the store.
///
/// Returns `None` if any of the four keys is missing, if a token fails to
/// decrypt, or if an expiration fails to parse. An unreadable session is
/// indistinguishable from an absent one.
pub(crate) async fn load_session(
    store: &dyn SessionStore,
    cipher: &StoreCipher,
) -> Result<Option<SessionTokens>, StoreError> {
    let Some(access) = store.get(KEY_ACCESS_TOKEN).await? else { return Ok(None) };
    let Some(access_expiration) = store.get(KEY_ACCESS_EXPIRATION).await? else {
        return Ok(None);
    };
    let Some(refresh) = store.get(KEY_REFRESH_TOKEN).await? else { return Ok(None) };
    let Some(refresh_expiration) = store.get(KEY_REFRESH_EXPIRATION).await? else {
        return Ok(None);
    };

    let Some(access_token) = cipher.decrypt_str(&access) else {
        debug!("Persisted access token could not be decrypted");
        return Ok(None);
    };
    let Some(refresh_token) = cipher.decrypt_str(&refresh) else {
        debug!("Persisted refresh token could not be decrypted");
        return Ok(None);
    };

    let (Ok(access_expiry), Ok(refresh_expiry)) = (
        DateTime::parse_from_rfc3339(&access_expiration),
        DateTime::parse_from_rfc3339(&refresh_expiration),
    ) else {
        debug!("Persisted expiration timestamps could not be parsed");
        return Ok(None);
    };

    Ok(Some(SessionTokens {
        access_token,
        access_expiry: access_expiry.into(),
        refresh_token,
        refresh_expiry: refresh_expiry.into(),
    }))
}

/// Remove every persisted credential key from the store.
pub(crate) async fn clear_session(store: &dyn SessionStore) -> Result<(), StoreError> {
    for key in ALL_KEYS {
        store.remove(key).await?;
    }

    Ok(())
}
