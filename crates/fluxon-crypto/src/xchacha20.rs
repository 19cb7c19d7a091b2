//! XChaCha20-Poly1305 AEAD encryption (192-bit random nonce).
//!
//! Used for at-rest encryption only: the keystore blob holding the static
//! keypair, signing keypair, trust store, and active group descriptor. Its
//! wide 192-bit nonce is what makes a random per-write nonce safe for a
//! long-lived file that is rewritten many times over a node's life. Group
//! broadcast payloads use the narrower [`crate::chacha20`] IETF variant
//! instead, per the group cipher's own per-message nonce budget.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::{CryptoError, Result};

/// Nonce size for XChaCha20-Poly1305 (192 bits = 24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Key size for XChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Authentication tag size (128 bits = 16 bytes).
pub const TAG_SIZE: usize = 16;

/// Draw a fresh random 24-byte nonce from the OS CSPRNG.
pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key` with `aad` bound into the tag.
///
/// `nonce` must never be reused under the same key; callers that cannot
/// coordinate a counter should draw it from [`random_nonce`].
pub fn encrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce);
    cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::AeadDecryption)
}

/// Decrypt `ciphertext` (tag appended) under `key`, verifying `aad`.
pub fn decrypt(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce);
    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AeadDecryption)
}

/// Encrypt and prepend the random nonce to the returned buffer, so callers
/// that have nowhere else to carry the nonce (e.g. at-rest blobs) can store
/// one opaque byte string.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let nonce = random_nonce();
    let mut out = Vec::with_capacity(NONCE_SIZE + plaintext.len() + TAG_SIZE);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&encrypt(key, &nonce, plaintext, aad)?);
    Ok(out)
}

/// Inverse of [`seal`]: split the leading nonce off `sealed` and decrypt.
pub fn open(key: &[u8; KEY_SIZE], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_SIZE {
        return Err(CryptoError::InvalidInput("sealed blob shorter than nonce".into()));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(nonce_bytes);
    decrypt(key, &nonce, ciphertext, aad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [0x11u8; KEY_SIZE];
        let nonce = random_nonce();
        let aad = b"group-context";
        let ct = encrypt(&key, &nonce, b"hello group", aad).expect("encrypt");
        let pt = decrypt(&key, &nonce, &ct, aad).expect("decrypt");
        assert_eq!(pt, b"hello group");
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = [0x22u8; KEY_SIZE];
        let sealed = seal(&key, b"keystore secret", b"").expect("seal");
        let opened = open(&key, &sealed, b"").expect("open");
        assert_eq!(opened, b"keystore secret");
    }

    #[test]
    fn test_nonces_differ() {
        let n1 = random_nonce();
        let n2 = random_nonce();
        assert_ne!(n1, n2);
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = [0x33u8; KEY_SIZE];
        let nonce = random_nonce();
        let ct = encrypt(&key, &nonce, b"msg", b"aad1").expect("encrypt");
        assert!(decrypt(&key, &nonce, &ct, b"aad2").is_err());
    }

    #[test]
    fn test_open_rejects_short_blob() {
        let key = [0x44u8; KEY_SIZE];
        assert!(open(&key, &[0u8; 4], b"").is_err());
    }
}
