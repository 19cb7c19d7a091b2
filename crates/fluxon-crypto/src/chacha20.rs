//! ChaCha20-Poly1305 AEAD encryption (RFC 8439), IETF 96-bit nonce variant.
//!
//! Used for the Noise transport-phase CipherState and for the group
//! cipher's per-message AEAD. Original DJB ChaCha20-Poly1305 (64-bit nonce)
//! is never used — only the IETF 96-bit-nonce variant.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;

use crate::{CryptoError, Result};

/// Nonce size for ChaCha20-Poly1305 (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Key size for ChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Authentication tag size (128 bits = 16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt data with ChaCha20-Poly1305.
///
/// # Arguments
///
/// * `key` - 32-byte encryption key
/// * `nonce` - 12-byte nonce (must never be reused with the same key)
/// * `plaintext` - Data to encrypt
/// * `aad` - Additional authenticated data (not encrypted, but authenticated)
///
/// # Returns
///
/// Ciphertext with appended 16-byte authentication tag.
pub fn encrypt(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = Nonce::from_slice(nonce);

    cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AeadDecryption)
}

/// Decrypt data with ChaCha20-Poly1305.
///
/// # Arguments
///
/// * `key` - 32-byte encryption key
/// * `nonce` - 12-byte nonce
/// * `ciphertext` - Ciphertext with appended authentication tag
/// * `aad` - Additional authenticated data (must match what was used during encryption)
///
/// # Returns
///
/// Decrypted plaintext, or error if authentication fails.
pub fn decrypt(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = Nonce::from_slice(nonce);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AeadDecryption)
}

/// Encrypt data without additional authenticated data.
pub fn encrypt_no_aad(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    encrypt(key, nonce, plaintext, &[])
}

/// Decrypt data without additional authenticated data.
pub fn decrypt_no_aad(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    decrypt(key, nonce, ciphertext, &[])
}

/// Draw a fresh random 12-byte nonce from the OS CSPRNG. Used where callers
/// cannot coordinate a counter and must rely on collision-safe randomness
/// instead (the group cipher's per-message nonce).
pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt and prepend the random nonce to the returned buffer.
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
        let key = [0x42u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];
        let plaintext = b"Hello, Fluxon!";
        let aad = b"associated data";

        let ciphertext = encrypt(&key, &nonce, plaintext, aad).expect("encrypt");
        let decrypted = decrypt(&key, &nonce, &ciphertext, aad).expect("decrypt");

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_no_aad_roundtrip() {
        let key = [0x42u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];
        let plaintext = b"test data";

        let ciphertext = encrypt_no_aad(&key, &nonce, plaintext).expect("encrypt");
        let decrypted = decrypt_no_aad(&key, &nonce, &ciphertext).expect("decrypt");

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ciphertext_has_tag() {
        let key = [0x42u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];
        let plaintext = b"test";

        let ciphertext = encrypt_no_aad(&key, &nonce, plaintext).expect("encrypt");
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = [0x01u8; KEY_SIZE];
        let key2 = [0x02u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];

        let ciphertext = encrypt_no_aad(&key1, &nonce, b"test").expect("encrypt");
        assert!(decrypt_no_aad(&key2, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let key = [0x01u8; KEY_SIZE];
        let nonce1 = [0x01u8; NONCE_SIZE];
        let nonce2 = [0x02u8; NONCE_SIZE];

        let ciphertext = encrypt_no_aad(&key, &nonce1, b"test").expect("encrypt");
        assert!(decrypt_no_aad(&key, &nonce2, &ciphertext).is_err());
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = [0x01u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];

        let ciphertext = encrypt(&key, &nonce, b"test", b"aad1").expect("encrypt");
        assert!(decrypt(&key, &nonce, &ciphertext, b"aad2").is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [0x01u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];

        let mut ciphertext = encrypt_no_aad(&key, &nonce, b"test").expect("encrypt");
        if let Some(byte) = ciphertext.first_mut() {
            *byte ^= 0xFF;
        }
        assert!(decrypt_no_aad(&key, &nonce, &ciphertext).is_err());
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = [0x50u8; KEY_SIZE];
        let sealed = seal(&key, b"group broadcast", b"type-and-source").expect("seal");
        let opened = open(&key, &sealed, b"type-and-source").expect("open");
        assert_eq!(opened, b"group broadcast");
    }

    #[test]
    fn test_seal_nonces_vary() {
        let key = [0x51u8; KEY_SIZE];
        let a = seal(&key, b"same plaintext", b"").expect("seal a");
        let b = seal(&key, b"same plaintext", b"").expect("seal b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_rejects_short_blob() {
        let key = [0x52u8; KEY_SIZE];
        assert!(open(&key, &[0u8; 4], b"").is_err());
    }

    #[test]
    fn test_open_rejects_wrong_aad() {
        let key = [0x53u8; KEY_SIZE];
        let sealed = seal(&key, b"payload", b"aad1").expect("seal");
        assert!(open(&key, &sealed, b"aad2").is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let key = [0x42u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];

        let ciphertext = encrypt_no_aad(&key, &nonce, b"").expect("encrypt");
        assert_eq!(ciphertext.len(), TAG_SIZE);

        let decrypted = decrypt_no_aad(&key, &nonce, &ciphertext).expect("decrypt");
        assert!(decrypted.is_empty());
    }
}
