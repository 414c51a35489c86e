// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential-derived encryption for the persisted API token.
//!
//! The token on disk is worthless without the account credentials: the
//! AES-256-GCM key is derived from `email:password` with PBKDF2-HMAC-SHA256
//! and a per-save random salt. Salt and nonce are regenerated on every
//! encryption, so a nonce can never be reused under the same key.

use crate::error::AppError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

/// PBKDF2 iteration count. Recommended minimum for SHA-256.
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes (regenerated per save).
pub const SALT_LEN: usize = 32;

/// AES-256 key length in bytes.
const KEY_LEN: usize = 32;

/// GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// A derived 256-bit encryption key.
pub struct DerivedKey([u8; KEY_LEN]);

/// Encryption service for the stored token blob.
#[derive(Clone)]
pub struct CryptoVault {
    rng: SystemRandom,
}

impl Default for CryptoVault {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoVault {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    /// Derive an AES-256 key from account credentials and a salt.
    ///
    /// Deliberately slow (PBKDF2, 100k iterations) so brute-forcing the
    /// on-disk blob requires the original credentials.
    pub fn derive_key(email: &str, password: &str, salt: &[u8]) -> DerivedKey {
        let material = format!("{}:{}", email.trim().to_lowercase(), password);
        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            NonZeroU32::new(PBKDF2_ITERATIONS).expect("iterations is non-zero"),
            salt,
            material.as_bytes(),
            &mut key,
        );
        DerivedKey(key)
    }

    /// Generate a fresh random salt.
    pub fn generate_salt(&self) -> Result<[u8; SALT_LEN], AppError> {
        let mut salt = [0u8; SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("CSPRNG failure generating salt")))?;
        Ok(salt)
    }

    /// Encrypt a plaintext token under the given key.
    ///
    /// Returns `nonce(12) ‖ ciphertext ‖ tag(16)` as one opaque blob. The
    /// nonce is drawn fresh from the CSPRNG on every call.
    pub fn encrypt(&self, plaintext: &str, key: &DerivedKey) -> Result<Vec<u8>, AppError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &key.0)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to build AES-GCM key")))?;
        let sealing = LessSafeKey::new(unbound);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("CSPRNG failure generating nonce")))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        sealing
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("AES-GCM seal failed")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + in_out.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&in_out);
        Ok(blob)
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// A bad tag means tampering or the wrong credentials; this returns a
    /// typed [`AppError::Decryption`] and never partial plaintext.
    pub fn decrypt(&self, blob: &[u8], key: &DerivedKey) -> Result<String, AppError> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(AppError::Decryption("token blob too short".to_string()));
        }

        let unbound = UnboundKey::new(&AES_256_GCM, &key.0)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to build AES-GCM key")))?;
        let opening = LessSafeKey::new(unbound);

        let nonce_bytes: [u8; NONCE_LEN] = blob[..NONCE_LEN]
            .try_into()
            .expect("slice length checked above");
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = blob[NONCE_LEN..].to_vec();
        let plaintext = opening
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| {
                AppError::Decryption("authentication tag mismatch (wrong credentials?)".to_string())
            })?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| AppError::Decryption("decrypted token is not UTF-8".to_string()))
    }
}
