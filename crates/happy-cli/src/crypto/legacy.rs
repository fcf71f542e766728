// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `legacy` crypto variant: a single 32-byte symmetric secret shared
//! between the CLI and the mobile client, AES-256-GCM per payload.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

pub struct LegacyCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl LegacyCipher {
    pub fn new(secret: &[u8; KEY_LEN]) -> anyhow::Result<Self> {
        let unbound =
            UnboundKey::new(&AES_256_GCM, secret).map_err(|_| anyhow::anyhow!("invalid AES-256-GCM key"))?;
        Ok(Self { key: LessSafeKey::new(unbound), rng: SystemRandom::new() })
    }

    /// Seal `plaintext`, returning `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| anyhow::anyhow!("nonce generation failed"))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| anyhow::anyhow!("seal failed"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(out)
    }

    /// Open a `nonce || ciphertext || tag` blob. Returns `None` on any
    /// malformed input or authentication failure.
    pub fn decrypt(&self, blob: &[u8]) -> Option<Vec<u8>> {
        if blob.len() < NONCE_LEN {
            return None;
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).ok()?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self.key.open_in_place(nonce, Aad::empty(), &mut in_out).ok()?;
        Some(plaintext.to_vec())
    }
}

#[cfg(test)]
#[path = "legacy_tests.rs"]
mod tests;
