// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `data-key` crypto variant: a random per-resource data key, wrapped
//! by the public half of a content key pair that is itself derived from a
//! master secret through an HKDF-style domain-separated step (label
//! `"Happy EnCoder"`, context `"content"`).

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::hkdf::{KeyType, Salt, HKDF_SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use x25519_dalek::{PublicKey, StaticSecret};

const NONCE_LEN: usize = 12;
const VERSION: u8 = 1;

struct Len32;

impl KeyType for Len32 {
    fn len(&self) -> usize {
        32
    }
}

/// Derive the deterministic content key pair from a master secret.
pub fn content_keypair_from_seed(master_seed: &[u8]) -> anyhow::Result<(StaticSecret, PublicKey)> {
    let key_bytes = hkdf_derive(master_seed)?;
    let secret = StaticSecret::from(key_bytes);
    let public = PublicKey::from(&secret);
    Ok((secret, public))
}

fn hkdf_derive(ikm: &[u8]) -> anyhow::Result<[u8; 32]> {
    let salt = Salt::new(HKDF_SHA256, &[]);
    let prk = salt.extract(ikm);
    let okm = prk
        .expand(&[b"Happy EnCoder", b"content"], Len32)
        .map_err(|_| anyhow::anyhow!("HKDF expand failed"))?;
    let mut out = [0u8; 32];
    okm.fill(&mut out).map_err(|_| anyhow::anyhow!("HKDF fill failed"))?;
    Ok(out)
}

fn aead_seal(key_bytes: &[u8; 32], rng: &SystemRandom, plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
    let unbound =
        UnboundKey::new(&AES_256_GCM, key_bytes).map_err(|_| anyhow::anyhow!("invalid AES-256-GCM key"))?;
    let key = LessSafeKey::new(unbound);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| anyhow::anyhow!("nonce generation failed"))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| anyhow::anyhow!("seal failed"))?;

    let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

fn aead_open(key_bytes: &[u8; 32], blob: &[u8]) -> Option<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return None;
    }
    let unbound = UnboundKey::new(&AES_256_GCM, key_bytes).ok()?;
    let key = LessSafeKey::new(unbound);
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).ok()?;
    let mut in_out = ciphertext.to_vec();
    let plaintext = key.open_in_place(nonce, Aad::empty(), &mut in_out).ok()?;
    Some(plaintext.to_vec())
}

pub struct DataKeyCipher {
    content_secret: StaticSecret,
    content_public: PublicKey,
    rng: SystemRandom,
}

impl DataKeyCipher {
    pub fn from_seed(master_seed: &[u8]) -> anyhow::Result<Self> {
        let (content_secret, content_public) = content_keypair_from_seed(master_seed)?;
        Ok(Self { content_secret, content_public, rng: SystemRandom::new() })
    }

    /// Encrypt `plaintext` under a freshly generated data key, wrapping that
    /// key to this cipher's content public key.
    ///
    /// Wire format: `version(1) || ephemeral_public(32) || wrapped_data_key
    /// || nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut data_key = [0u8; 32];
        self.rng.fill(&mut data_key).map_err(|_| anyhow::anyhow!("data key generation failed"))?;

        let mut ephemeral_bytes = [0u8; 32];
        self.rng
            .fill(&mut ephemeral_bytes)
            .map_err(|_| anyhow::anyhow!("ephemeral key generation failed"))?;
        let ephemeral_secret = StaticSecret::from(ephemeral_bytes);
        let ephemeral_public = PublicKey::from(&ephemeral_secret);

        let shared = ephemeral_secret.diffie_hellman(&self.content_public);
        let wrap_key = hkdf_derive(shared.as_bytes())?;
        let wrapped_data_key = aead_seal(&wrap_key, &self.rng, &data_key)?;

        let ciphertext = aead_seal(&data_key, &self.rng, plaintext)?;

        let mut out = Vec::with_capacity(1 + 32 + wrapped_data_key.len() + ciphertext.len());
        out.push(VERSION);
        out.extend_from_slice(ephemeral_public.as_bytes());
        out.extend_from_slice(&wrapped_data_key);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Unwrap and open a blob produced by [`Self::encrypt`]. Returns `None`
    /// on any format, agreement, or authentication failure.
    pub fn decrypt(&self, blob: &[u8]) -> Option<Vec<u8>> {
        if blob.is_empty() || blob[0] != VERSION {
            return None;
        }
        let rest = &blob[1..];
        if rest.len() < 32 {
            return None;
        }
        let (ephemeral_public_bytes, rest) = rest.split_at(32);
        let mut epk = [0u8; 32];
        epk.copy_from_slice(ephemeral_public_bytes);
        let ephemeral_public = PublicKey::from(epk);

        // wrapped_data_key is nonce(12) || data_key(32) || tag(16)
        const WRAPPED_LEN: usize = NONCE_LEN + 32 + 16;
        if rest.len() < WRAPPED_LEN {
            return None;
        }
        let (wrapped_data_key, ciphertext) = rest.split_at(WRAPPED_LEN);

        let shared = self.content_secret.diffie_hellman(&ephemeral_public);
        let wrap_key = hkdf_derive(shared.as_bytes()).ok()?;
        let data_key_bytes = aead_open(&wrap_key, wrapped_data_key)?;
        if data_key_bytes.len() != 32 {
            return None;
        }
        let mut data_key = [0u8; 32];
        data_key.copy_from_slice(&data_key_bytes);

        aead_open(&data_key, ciphertext)
    }
}

#[cfg(test)]
#[path = "datakey_tests.rs"]
mod tests;
