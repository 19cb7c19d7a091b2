//! Per-message group payload AEAD: ChaCha20-Poly1305 IETF with a random
//! 12-byte nonce (§4.5 — the group cipher intentionally differs from the
//! Noise transport's counter nonce, since group broadcasts have no shared
//! sequence state to coordinate). Random nonces are collision-safe at the
//! message volumes this protocol expects.
//!
//! Callers are responsible for building the associated data themselves —
//! at minimum the packet's `type` byte and its `source_id` (§4.5) — and for
//! supplying the identical AD on decrypt. This module does not hard-code an
//! AD shape so the mesh service can bind whatever context it needs.

use crate::Result;

/// Encrypt `plaintext` under `group_key`, with caller-supplied `aad` bound
/// into the authentication tag.
pub fn encrypt_group_payload(group_key: &[u8; 32], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let sealed = fluxon_crypto::chacha20::seal(group_key, plaintext, aad)?;
    Ok(sealed)
}

/// Decrypt a payload sealed by [`encrypt_group_payload`] with the same
/// `aad`.
pub fn decrypt_group_payload(group_key: &[u8; 32], aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    let plaintext = fluxon_crypto::chacha20::open(group_key, sealed, aad)?;
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [0x20u8; 32];
        let aad = [0x02u8; 33]; // type byte + 32-byte source_id, as one example shape
        let sealed = encrypt_group_payload(&key, &aad, b"meet at the ridge at dusk").expect("encrypt");
        let plaintext = decrypt_group_payload(&key, &aad, &sealed).expect("decrypt");
        assert_eq!(plaintext, b"meet at the ridge at dusk");
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = [0x21u8; 32];
        let aad_a = [0x02u8; 33];
        let aad_b = [0x0Eu8; 33];
        let sealed = encrypt_group_payload(&key, &aad_a, b"payload").expect("encrypt");
        assert!(decrypt_group_payload(&key, &aad_b, &sealed).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let aad = [0x03u8; 33];
        let sealed = encrypt_group_payload(&[0x01u8; 32], &aad, b"payload").expect("encrypt");
        assert!(decrypt_group_payload(&[0x02u8; 32], &aad, &sealed).is_err());
    }

    #[test]
    fn test_nonces_vary_between_calls() {
        let key = [0x22u8; 32];
        let aad = [0x04u8; 33];
        let a = encrypt_group_payload(&key, &aad, b"same plaintext").expect("encrypt a");
        let b = encrypt_group_payload(&key, &aad, b"same plaintext").expect("encrypt b");
        assert_ne!(a, b);
    }
}
