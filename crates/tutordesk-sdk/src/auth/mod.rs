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

//! The authenticated-session lifecycle.
//!
//! A [`SessionManager`] owns the authenticated/unauthenticated state of the
//! client, the access/refresh token pair and the recurring check that renews
//! the access token before expiry or ends the session. It is meant to be
//! constructed once by the application's composition root and handed to
//! every collaborator that needs the token or the status signals.

use std::{fmt, sync::Arc};

use eyeball::{SharedObservable, Subscriber};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, instrument, warn};
use tutordesk_store_encryption::StoreCipher;

use crate::{
    config::SessionConfig,
    error::{HttpError, HttpResult, RefreshTokenError, Result},
    http_client::HttpClient,
    session::SessionTokens,
    store::{self, SessionStore},
};

/// A change of the session state, broadcast to every subscriber.
///
/// The application's router treats [`LoggedIn`] as the cue to navigate to
/// the landing destination and [`LoggedOut`] as the cue to navigate back to
/// the entry destination. Feature modules holding cached server data treat
/// [`LoggedOut`] as the signal to drop their caches.
///
/// [`LoggedIn`]: SessionChange::LoggedIn
/// [`LoggedOut`]: SessionChange::LoggedOut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    /// A session was established, by login or by restoring persisted
    /// credentials.
    LoggedIn,

    /// The access token was renewed; the session itself is unchanged.
    TokensRenewed,

    /// The session ended, by explicit logout, renewal failure or credential
    /// expiry.
    LoggedOut,
}

struct SessionManagerInner {
    config: SessionConfig,
    http_client: HttpClient,
    store: Arc<dyn SessionStore>,
    cipher: StoreCipher,
    /// The current token pair. `None` while unauthenticated.
    tokens: SharedObservable<Option<SessionTokens>>,
    /// The authentication status signal consumed by the UI.
    authenticated: SharedObservable<bool>,
    /// The login-error signal consumed by the login form.
    login_error: SharedObservable<bool>,
    /// Lock making sure we're only doing one token renewal at a time.
    refresh_token_lock: Mutex<Result<(), RefreshTokenError>>,
    /// Handle of the periodic session check, while one is running.
    renewal_task: Mutex<Option<JoinHandle<()>>>,
    changes: broadcast::Sender<SessionChange>,
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for SessionManagerInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManagerInner").field("config", &self.config).finish_non_exhaustive()
    }
}

/// The session manager of the back-office client.
///
/// Cloning is cheap, all clones share the same session state.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use tutordesk_sdk::{config::SessionConfig, store::MemoryStore, SessionManager};
/// use url::Url;
///
/// # async {
/// let config = SessionConfig::new(Url::parse("https://api.example.com")?);
/// let manager = SessionManager::new(config, Arc::new(MemoryStore::new()), "store secret")?;
///
/// if !manager.auto_authenticate().await? {
///     manager.login("teacher", "wordpass").await?;
/// }
///
/// let token = manager.access_token().expect("we just logged in");
/// # anyhow::Ok(()) };
/// ```
#[derive(Clone, Debug)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

impl SessionManager {
    /// Create a new `SessionManager`.
    ///
    /// # Arguments
    ///
    /// * `config` - Server URL, token lifetimes and check timings.
    ///
    /// * `store` - Where encrypted credentials are persisted across
    ///   restarts.
    ///
    /// * `store_secret` - The symmetric secret the credentials are encrypted
    ///   with before they reach the store.
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        store_secret: &str,
    ) -> Result<Self> {
        let http_client = HttpClient::new(&config.auth_server_url, config.request_timeout)?;
        let cipher = StoreCipher::new_from_passphrase(store_secret);

        Ok(Self {
            inner: Arc::new(SessionManagerInner {
                config,
                http_client,
                store,
                cipher,
                tokens: SharedObservable::new(None),
                authenticated: SharedObservable::new(false),
                login_error: SharedObservable::new(false),
                refresh_token_lock: Mutex::new(Ok(())),
                renewal_task: Mutex::new(None),
                changes: broadcast::Sender::new(16),
            }),
        })
    }

    /// Log into the server with a username and password.
    ///
    /// On success the returned token pair is stamped with expiries, the
    /// encrypted credentials are persisted, the periodic session check is
    /// started and a [`SessionChange::LoggedIn`] is broadcast.
    ///
    /// On failure nothing changes: the login-error signal fires with `true`
    /// exactly once and the error is returned to the caller.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        match self.inner.http_client.create_token(username, password).await {
            Ok(response) => {
                info!("Logged in");

                let tokens = SessionTokens::new(
                    response.access,
                    self.inner.config.access_token_lifetime,
                    response.refresh,
                    self.inner.config.refresh_token_lifetime,
                );

                self.inner.login_error.set_if_not_eq(false);
                self.set_session(tokens).await?;
                let _ = self.inner.changes.send(SessionChange::LoggedIn);

                Ok(())
            }
            Err(error) => {
                warn!("Login failed: {error}");
                self.inner.login_error.set(true);
                Err(error.into())
            }
        }
    }

    /// Try to restore a persisted session, once at process start.
    ///
    /// Returns `true` and behaves like a successful login when the store
    /// holds a decryptable, non-expired session. In every other case, an
    /// absent, incomplete, undecryptable or refresh-expired session, it
    /// falls back to [`logout()`] so that neither memory nor store is left
    /// partially populated, and returns `false`.
    ///
    /// [`logout()`]: Self::logout
    #[instrument(skip_all)]
    pub async fn auto_authenticate(&self) -> Result<bool> {
        match store::load_session(&*self.inner.store, &self.inner.cipher).await? {
            Some(tokens) if !tokens.refresh_expired() => {
                debug!("Restoring persisted session");

                self.inner.tokens.set(Some(tokens));
                self.inner.authenticated.set_if_not_eq(true);
                self.start_renewal_task().await;
                let _ = self.inner.changes.send(SessionChange::LoggedIn);

                Ok(true)
            }
            _ => {
                debug!("No usable persisted session, starting unauthenticated");
                self.logout().await?;
                Ok(false)
            }
        }
    }

    /// Renew the access token using the current refresh token.
    ///
    /// On success the new access token replaces the old one in memory and in
    /// the store; the refresh token is untouched and the session stays
    /// authenticated. Any failure is fatal for the session and triggers a
    /// full [`logout()`]; there is no partial or degraded state.
    ///
    /// This method is protected behind a lock, so calling it several times
    /// at once will only call the endpoint once and all subsequent calls
    /// will wait for the result of the first call. The first call returns
    /// `Ok(Some(access_token))` or the [`HttpError`] returned by the
    /// endpoint, while the others return `Ok(None)` if the token was renewed
    /// by the first call, or a [`RefreshTokenError`] if it failed.
    ///
    /// [`logout()`]: Self::logout
    pub async fn renew_access_token(&self) -> HttpResult<Option<String>> {
        let lock = self.inner.refresh_token_lock.try_lock();

        if let Ok(mut guard) = lock {
            let Some(mut tokens) = self.inner.tokens.get() else {
                *guard = Err(RefreshTokenError::RefreshTokenRequired);
                return Err(RefreshTokenError::RefreshTokenRequired.into());
            };

            if tokens.refresh_expired() {
                *guard = Err(RefreshTokenError::RefreshTokenExpired);
                drop(guard);
                self.logout_after_renewal_failure().await;
                return Err(RefreshTokenError::RefreshTokenExpired.into());
            }

            let res = self.inner.http_client.refresh_token(&tokens.refresh_token).await;

            match res {
                Ok(response) => {
                    *guard = Ok(());

                    if self.inner.tokens.get().is_none() {
                        // Logged out while the renewal was in flight; the
                        // result must not resurrect the session.
                        return Ok(None);
                    }

                    tokens.update_with_renewal(
                        response.access.clone(),
                        self.inner.config.access_token_lifetime,
                    );

                    if let Err(error) =
                        store::save_session(&*self.inner.store, &self.inner.cipher, &tokens).await
                    {
                        warn!("Failed to re-persist the renewed session: {error}");
                    }

                    self.inner.tokens.set(Some(tokens));
                    let _ = self.inner.changes.send(SessionChange::TokensRenewed);

                    Ok(Some(response.access))
                }
                Err(error) => {
                    *guard = match &error {
                        HttpError::Api(status) => Err(RefreshTokenError::Rejected(*status)),
                        _ => Err(RefreshTokenError::UnableToRefreshToken),
                    };
                    drop(guard);

                    warn!("Renewing the access token failed: {error}");
                    self.logout_after_renewal_failure().await;

                    Err(error)
                }
            }
        } else {
            match &*self.inner.refresh_token_lock.lock().await {
                Ok(()) => Ok(None),
                Err(error) => Err(error.clone().into()),
            }
        }
    }

    /// End the session unconditionally.
    ///
    /// Clears the in-memory tokens, flips the status signal, erases every
    /// persisted credential key and stops the periodic check. The in-memory
    /// and persisted state are cleared before this method returns, so any
    /// subsequent [`access_token()`] call observes the cleared state.
    /// Already-in-flight API calls made with the old token are not
    /// cancelled.
    ///
    /// Idempotent: calling it while already unauthenticated broadcasts no
    /// further change and leaves the store empty.
    ///
    /// [`access_token()`]: Self::access_token
    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<()> {
        let was_authenticated = self.inner.authenticated.get();

        self.inner.tokens.set(None);
        self.inner.authenticated.set_if_not_eq(false);
        store::clear_session(&*self.inner.store).await?;

        if was_authenticated {
            info!("Logged out");
            let _ = self.inner.changes.send(SessionChange::LoggedOut);
        }

        self.stop_renewal_task().await;

        Ok(())
    }

    /// React to an API response that declared the access token categorically
    /// invalid.
    ///
    /// Collaborators attaching [`access_token()`] to their own requests call
    /// this when the server rejects the credential as unauthenticated; the
    /// session ends the same way as an explicit logout.
    ///
    /// [`access_token()`]: Self::access_token
    pub async fn handle_unauthorized(&self) -> Result<()> {
        warn!("The server rejected the access token, ending the session");
        self.logout().await
    }

    /// Run the session check out of band.
    ///
    /// The host environment calls this when returning from a suspended or
    /// backgrounded state: the periodic task may not have ticked while
    /// suspended, and the expiry comparisons are against absolute wall-clock
    /// timestamps, so an immediate re-evaluation self-corrects.
    pub async fn handle_resume(&self) {
        self.check_session().await;
    }

    /// Get the current access token, for attachment to outbound API calls.
    ///
    /// A pure read with no side effects; `None` while unauthenticated.
    pub fn access_token(&self) -> Option<String> {
        self.inner.tokens.get().map(|tokens| tokens.access_token)
    }

    /// Get the current session tokens.
    ///
    /// `None` while unauthenticated.
    pub fn session_tokens(&self) -> Option<SessionTokens> {
        self.inner.tokens.get()
    }

    /// Whether a session is currently established.
    pub fn is_authenticated(&self) -> bool {
        self.inner.authenticated.get()
    }

    /// Subscribe to the authentication status signal.
    ///
    /// The subscriber yields `true`/`false` on every transition; dependent
    /// components react to state changes without polling.
    pub fn subscribe_to_auth_status(&self) -> Subscriber<bool> {
        self.inner.authenticated.subscribe()
    }

    /// Subscribe to the login-error signal.
    ///
    /// Yields `true` once per failed login attempt and `false` when a later
    /// attempt succeeds.
    pub fn subscribe_to_login_errors(&self) -> Subscriber<bool> {
        self.inner.login_error.subscribe()
    }

    /// Subscribe to the stream of session changes.
    pub fn subscribe_to_session_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.inner.changes.subscribe()
    }

    async fn set_session(&self, tokens: SessionTokens) -> Result<()> {
        store::save_session(&*self.inner.store, &self.inner.cipher, &tokens).await?;
        self.inner.tokens.set(Some(tokens));
        self.inner.authenticated.set_if_not_eq(true);
        self.start_renewal_task().await;

        Ok(())
    }

    /// The expiry-comparison routine shared by the periodic task and
    /// [`handle_resume()`](Self::handle_resume).
    ///
    /// Refresh expiry is evaluated first: a backend that misconfigures
    /// lifetimes so the access token outlives the refresh token degrades to
    /// a logout here rather than to undefined behavior.
    async fn check_session(&self) {
        let Some(tokens) = self.inner.tokens.get() else { return };

        if tokens.refresh_expired() {
            info!("The refresh token has expired, ending the session");
            if let Err(error) = self.logout().await {
                warn!("Logging out after refresh token expiry failed: {error}");
            }
            return;
        }

        if tokens.access_expires_within(self.inner.config.renewal_lead_time) {
            debug!("The access token is about to expire, renewing it");
            // A failed renewal already ends the session.
            let _ = self.renew_access_token().await;
        }
    }

    async fn start_renewal_task(&self) {
        let mut guard = self.inner.renewal_task.lock().await;

        if guard.is_some() {
            return;
        }

        let manager = self.clone();
        let period = self.inner.config.renewal_check_interval;

        *guard = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a fresh interval fires immediately and the
            // tokens can't need a check right after login, skip it.
            interval.tick().await;

            loop {
                interval.tick().await;
                manager.check_session().await;
            }
        }));
    }

    async fn stop_renewal_task(&self) {
        if let Some(handle) = self.inner.renewal_task.lock().await.take() {
            handle.abort();
        }
    }

    async fn logout_after_renewal_failure(&self) {
        if let Err(error) = self.logout().await {
            warn!("Logging out after a failed renewal failed itself: {error}");
        }
    }
}
