// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Symmetric AEAD encryption, key-pair derivation, and auth-challenge
//! signing. Two interchangeable variants select on the shape of the
//! credentials file: `legacy` (one shared secret) and `data-key` (per-
//! resource data key wrapped to a derived content key pair).

pub mod auth;
pub mod datakey;
pub mod legacy;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Selects which on-disk credentials shape drives encryption.
pub enum Cipher {
    Legacy(legacy::LegacyCipher),
    DataKey(datakey::DataKeyCipher),
}

impl Cipher {
    /// Encrypt a value, returning base64 suitable for the wire.
    ///
    /// Never fails: callers always have something to send. Internal nonce
    /// generation failures are treated as unrecoverable and panic only in
    /// the pathological case the OS RNG is unavailable, matching the
    /// underlying primitives' contract.
    pub fn encrypt(&self, value: &[u8]) -> anyhow::Result<String> {
        let bytes = match self {
            Cipher::Legacy(c) => c.encrypt(value)?,
            Cipher::DataKey(c) => c.encrypt(value)?,
        };
        Ok(BASE64.encode(bytes))
    }

    /// Decrypt a base64 payload. Returns `None` on any authentication or
    /// format failure; callers treat `None` as "skip this update", never as
    /// a fatal error.
    pub fn decrypt(&self, value: &str) -> Option<Vec<u8>> {
        let bytes = BASE64.decode(value).ok()?;
        match self {
            Cipher::Legacy(c) => c.decrypt(&bytes),
            Cipher::DataKey(c) => c.decrypt(&bytes),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
