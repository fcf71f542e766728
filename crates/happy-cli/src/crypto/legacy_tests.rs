use proptest::prelude::*;

use super::*;

fn cipher() -> LegacyCipher {
    LegacyCipher::new(&[7u8; KEY_LEN]).unwrap()
}

#[test]
fn roundtrip_encrypt_decrypt() {
    let c = cipher();
    let sealed = c.encrypt(b"hello happy").unwrap();
    assert_eq!(c.decrypt(&sealed).unwrap(), b"hello happy");
}

#[test]
fn empty_plaintext_roundtrip() {
    let c = cipher();
    let sealed = c.encrypt(b"").unwrap();
    assert_eq!(c.decrypt(&sealed).unwrap(), b"");
}

#[test]
fn unique_nonces_across_calls() {
    let c = cipher();
    let a = c.encrypt(b"same input").unwrap();
    let b = c.encrypt(b"same input").unwrap();
    assert_ne!(a, b);
}

#[test]
fn tampered_ciphertext_fails() {
    let c = cipher();
    let mut sealed = c.encrypt(b"tamper me").unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0xff;
    assert!(c.decrypt(&sealed).is_none());
}

#[test]
fn wrong_key_fails() {
    let a = LegacyCipher::new(&[1u8; KEY_LEN]).unwrap();
    let b = LegacyCipher::new(&[2u8; KEY_LEN]).unwrap();
    let sealed = a.encrypt(b"secret").unwrap();
    assert!(b.decrypt(&sealed).is_none());
}

#[test]
fn truncated_blob_fails() {
    let c = cipher();
    assert!(c.decrypt(&[0u8; 4]).is_none());
}

proptest! {
    #[test]
    fn roundtrip_arbitrary_bytes(data: Vec<u8>) {
        let c = cipher();
        let sealed = c.encrypt(&data).unwrap();
        prop_assert_eq!(c.decrypt(&sealed).unwrap(), data);
    }
}
