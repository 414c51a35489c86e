// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted, encrypted API token.
//!
//! One JSON record on disk, written whole-or-not via a temp file and
//! atomic rename. Format version "2.0" is the encrypted record; an
//! unversioned legacy record (plaintext token) is still readable and gets
//! upgraded on the next save. Anything stale, unreadable, or within the
//! expiry buffer is treated as absent and the file is removed.

use crate::error::AppError;
use crate::services::vault::CryptoVault;
use crate::time_utils::{format_naive_timestamp, parse_naive_timestamp};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A token within this margin of expiry is treated as already expired.
pub const EXPIRY_BUFFER_MINUTES: i64 = 10;

/// Current on-disk format version.
const FORMAT_VERSION: &str = "2.0";

/// On-disk record. Either the v2 encrypted fields or the legacy plaintext
/// `token` field is present.
#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    encrypted_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// A token successfully restored from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub token: String,
    pub expires_at: NaiveDateTime,
}

/// File-backed token persistence.
#[derive(Clone)]
pub struct TokenStore {
    path: PathBuf,
    vault: CryptoVault,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>, vault: CryptoVault) -> Self {
        Self {
            path: path.into(),
            vault,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encrypt and persist a token. A fresh salt (and therefore a fresh
    /// key and nonce) is used for every save.
    pub fn save(
        &self,
        token: &str,
        expires_at: NaiveDateTime,
        email: &str,
        password: &str,
    ) -> Result<(), AppError> {
        let salt = self.vault.generate_salt()?;
        let key = CryptoVault::derive_key(email, password, &salt);
        let blob = self.vault.encrypt(token, &key)?;

        let record = TokenRecord {
            encrypted_token: Some(BASE64.encode(&blob)),
            salt: Some(BASE64.encode(salt)),
            token: None,
            expires_at: Some(format_naive_timestamp(expires_at)),
            version: Some(FORMAT_VERSION.to_string()),
        };

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token serialization failed: {}", e)))?;
        self.write_atomic(&json)?;

        tracing::debug!(path = %self.path.display(), %expires_at, "Encrypted token saved");
        Ok(())
    }

    /// Load and decrypt the stored token.
    ///
    /// Returns `None` when the file is absent, unreadable, expired (with
    /// the 10-minute buffer), or fails to decrypt; every one of those
    /// cases except "absent" also removes the file so stale state is
    /// never silently kept around.
    pub fn load(&self, email: &str, password: &str) -> Option<StoredToken> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read token file");
                return None;
            }
        };

        let record: TokenRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(error = %e, "Token file is not valid JSON, clearing");
                self.clear();
                return None;
            }
        };

        let expires_at = match record.expires_at.as_deref().and_then(parse_naive_timestamp) {
            Some(ts) => ts,
            None => {
                tracing::debug!("Token file has no usable expiry, clearing");
                self.clear();
                return None;
            }
        };

        if expires_at < Local::now().naive_local() + Duration::minutes(EXPIRY_BUFFER_MINUTES) {
            tracing::debug!(%expires_at, "Stored token expired or expiring soon, clearing");
            self.clear();
            return None;
        }

        match record.version.as_deref() {
            Some(FORMAT_VERSION) => self.load_v2(&record, expires_at, email, password),
            // Legacy unversioned format: plaintext token, upgraded to the
            // encrypted format on the next save.
            _ => {
                let token = record.token?;
                tracing::info!(%expires_at, "Loaded legacy plaintext token, will upgrade on next save");
                Some(StoredToken { token, expires_at })
            }
        }
    }

    fn load_v2(
        &self,
        record: &TokenRecord,
        expires_at: NaiveDateTime,
        email: &str,
        password: &str,
    ) -> Option<StoredToken> {
        let (blob_b64, salt_b64) = match (&record.encrypted_token, &record.salt) {
            (Some(blob), Some(salt)) => (blob, salt),
            _ => {
                tracing::debug!("Encrypted token record is incomplete, clearing");
                self.clear();
                return None;
            }
        };

        let (blob, salt) = match (BASE64.decode(blob_b64), BASE64.decode(salt_b64)) {
            (Ok(blob), Ok(salt)) => (blob, salt),
            _ => {
                tracing::debug!("Encrypted token record is not valid base64, clearing");
                self.clear();
                return None;
            }
        };

        let key = CryptoVault::derive_key(email, password, &salt);
        match self.vault.decrypt(&blob, &key) {
            Ok(token) => {
                tracing::info!(%expires_at, "Restored encrypted token from disk");
                Some(StoredToken { token, expires_at })
            }
            Err(e) => {
                tracing::error!(error = %e, "Stored token failed to decrypt, clearing");
                self.clear();
                None
            }
        }
    }

    /// Remove the stored token. Idempotent.
    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Token file cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::debug!(error = %e, "Failed to clear token file"),
        }
    }

    /// Write the record to a sibling temp file, then rename over the
    /// target so a crash mid-save never leaves a torn record.
    fn write_atomic(&self, contents: &str) -> Result<(), AppError> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to write token file: {}", e)))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to replace token file: {}", e))
        })?;
        Ok(())
    }
}
