use ring::signature::{UnparsedPublicKey, ED25519};

use super::*;

#[test]
fn same_seed_derives_same_public_key() {
    let a = AuthKeyPair::from_seed(&[9u8; 32]).unwrap();
    let b = AuthKeyPair::from_seed(&[9u8; 32]).unwrap();
    assert_eq!(a.public_key_bytes(), b.public_key_bytes());
}

#[test]
fn different_seeds_derive_different_public_keys() {
    let a = AuthKeyPair::from_seed(&[1u8; 32]).unwrap();
    let b = AuthKeyPair::from_seed(&[2u8; 32]).unwrap();
    assert_ne!(a.public_key_bytes(), b.public_key_bytes());
}

#[test]
fn auth_challenge_signature_verifies_against_nonce_and_public_key() {
    let keys = AuthKeyPair::from_seed(&[3u8; 32]).unwrap();
    let challenge = keys.auth_challenge().unwrap();

    let mut signed = Vec::new();
    signed.extend_from_slice(&challenge.nonce);
    signed.extend_from_slice(&challenge.public_key);

    let verifier = UnparsedPublicKey::new(&ED25519, &challenge.public_key);
    assert!(verifier.verify(&signed, &challenge.signature).is_ok());
}

#[test]
fn successive_challenges_use_fresh_nonces() {
    let keys = AuthKeyPair::from_seed(&[4u8; 32]).unwrap();
    let a = keys.auth_challenge().unwrap();
    let b = keys.auth_challenge().unwrap();
    assert_ne!(a.nonce, b.nonce);
}
