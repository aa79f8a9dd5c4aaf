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

//! Client SDK for the TutorDesk back-office.
//!
//! The SDK owns the authenticated-session lifecycle of the client: logging
//! in against the REST backend, keeping the access token fresh with a
//! periodic renewal check, persisting encrypted credentials across restarts
//! and broadcasting state transitions to the rest of the application.
//!
//! The entry point is the [`SessionManager`], constructed once at startup:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tutordesk_sdk::{config::SessionConfig, store::MemoryStore, SessionManager};
//! use url::Url;
//!
//! # async {
//! let config = SessionConfig::new(Url::parse("https://api.example.com")?);
//! let manager = SessionManager::new(config, Arc::new(MemoryStore::new()), "store secret")?;
//!
//! // Restore the previous session, or ask the user to log in.
//! if !manager.auto_authenticate().await? {
//!     manager.login("teacher", "wordpass").await?;
//! }
//! # anyhow::Ok(()) };
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod config;
mod error;
mod http_client;
mod session;
pub mod store;

pub use tutordesk_store_encryption::{EncryptionError, StoreCipher};

pub use self::{
    auth::{SessionChange, SessionManager},
    config::SessionConfig,
    error::{Error, HttpError, HttpResult, RefreshTokenError, Result},
    session::SessionTokens,
};
