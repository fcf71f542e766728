// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic Ed25519 identity derivation and auth-challenge signing,
//! used by the one-shot HTTP authentication exchange in §6.2.

use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{Ed25519KeyPair, KeyPair};

/// A deterministic Ed25519 key pair derived from a fixed seed.
pub struct AuthKeyPair {
    inner: Ed25519KeyPair,
}

impl AuthKeyPair {
    /// Derive the signing key pair from a 32-byte seed. The same seed
    /// always yields the same public key, so the server can recognize a
    /// returning machine/session identity.
    pub fn from_seed(seed: &[u8; 32]) -> anyhow::Result<Self> {
        let inner = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|_| anyhow::anyhow!("invalid ed25519 seed"))?;
        Ok(Self { inner })
    }

    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.inner.public_key().as_ref().to_vec()
    }

    /// Build `{challenge, publicKey, signature}` for the one-shot auth POST:
    /// a random nonce signed together with the public key, binding the two
    /// together so the server can verify the holder of the seed produced
    /// this specific challenge.
    pub fn auth_challenge(&self) -> anyhow::Result<AuthChallenge> {
        let rng = SystemRandom::new();
        let mut nonce = [0u8; 32];
        rng.fill(&mut nonce).map_err(|_| anyhow::anyhow!("nonce generation failed"))?;

        let public_key = self.public_key_bytes();
        let mut signed = Vec::with_capacity(nonce.len() + public_key.len());
        signed.extend_from_slice(&nonce);
        signed.extend_from_slice(&public_key);
        let signature = self.inner.sign(&signed).as_ref().to_vec();

        Ok(AuthChallenge { nonce: nonce.to_vec(), public_key, signature })
    }
}

/// The payload sent to the auth endpoint, all fields base64 on the wire.
pub struct AuthChallenge {
    pub nonce: Vec<u8>,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
