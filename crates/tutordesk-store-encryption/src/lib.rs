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

//! Symmetric encryption for values that land in the session store.
//!
//! Credentials are never persisted in the clear. A [`StoreCipher`] derives a
//! ChaCha20-Poly1305 key from the application's build-time secret and turns
//! each value into an opaque base64 string. Decryption deliberately collapses
//! every failure mode into `None`: a value that can't be decoded, was
//! encrypted with a different secret, or was tampered with is treated the
//! same as a missing value by the caller.

#![warn(missing_docs)]

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{aead::Aead, Key, KeyInit, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Domain-separation salt for the key derivation.
const KDF_SALT: &[u8] = b"tutordesk-session-store";

/// Number of PBKDF2 rounds used to derive the store key.
const KDF_ROUNDS: u32 = 200_000;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 24;

/// Error type for the encryption side of the store cipher.
///
/// Decryption does not use this type, it reports failures as `None`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncryptionError {
    /// Failed to encrypt a value.
    #[error("error encrypting a value: {0}")]
    Encryption(chacha20poly1305::aead::Error),
}

/// A cipher that encrypts strings before they are persisted.
///
/// The key is derived once, at construction, from the configured secret.
/// The derived key is zeroized when the cipher is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct StoreCipher {
    key: [u8; KEY_SIZE],
}

impl StoreCipher {
    /// Create a new `StoreCipher` from a passphrase.
    ///
    /// The same passphrase always derives the same key, so values written by
    /// one process instance can be read by the next one.
    pub fn new_from_passphrase(passphrase: &str) -> Self {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), KDF_SALT, KDF_ROUNDS, &mut key);

        Self { key }
    }

    /// Encrypt a string for storage.
    ///
    /// Returns a base64 string carrying a random nonce and the ciphertext.
    /// Encrypting the same value twice yields different outputs.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));

        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(EncryptionError::Encryption)?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(payload))
    }

    /// Decrypt a string previously produced by [`encrypt_str`].
    ///
    /// Any failure, malformed base64, a truncated payload, a wrong key or a
    /// tampered ciphertext, yields `None`. Callers treat that as "no usable
    /// credential" rather than a distinct error.
    ///
    /// [`encrypt_str`]: Self::encrypt_str
    pub fn decrypt_str(&self, value: &str) -> Option<String> {
        let payload = BASE64.decode(value).ok()?;

        if payload.len() <= NONCE_SIZE {
            return None;
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_SIZE);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        let plaintext = cipher.decrypt(XNonce::from_slice(nonce), ciphertext).ok()?;

        String::from_utf8(plaintext).ok()
    }
}

#[cfg(not(tarpaulin_include))]
impl fmt::Debug for StoreCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCipher").finish_non_exhaustive()
    }
}
