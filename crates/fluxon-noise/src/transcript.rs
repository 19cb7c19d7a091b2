//! The Noise symmetric state: the running chaining key and transcript hash
//! shared across all handshake messages, plus the handshake-phase AEAD used
//! to protect the static key and payload fields once a DH result has mixed
//! key material in.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::{NoiseError, Result};

const PROTOCOL_NAME: &[u8] = b"Noise_XX_25519_ChaChaPoly_SHA256";

/// The handshake-phase AEAD, derived fresh each time a DH result is mixed
/// into the chaining key. Distinct from [`crate::cipherstate::CipherState`]:
/// this one has no replay window, since handshake messages are strictly
/// ordered and never reordered or dropped.
struct HandshakeCipher {
    key: [u8; 32],
    nonce: u64,
}

impl HandshakeCipher {
    fn encrypt(&mut self, h: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce_bytes = nonce_to_bytes(self.nonce);
        let ct = fluxon_crypto::chacha20::encrypt(&self.key, &nonce_bytes, plaintext, h)
            .map_err(NoiseError::Crypto)?;
        self.nonce += 1;
        Ok(ct)
    }

    fn decrypt(&mut self, h: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce_bytes = nonce_to_bytes(self.nonce);
        let pt = fluxon_crypto::chacha20::decrypt(&self.key, &nonce_bytes, ciphertext, h)
            .map_err(|_| NoiseError::DecryptionFailed)?;
        self.nonce += 1;
        Ok(pt)
    }
}

impl Drop for HandshakeCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

fn nonce_to_bytes(counter: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..12].copy_from_slice(&counter.to_le_bytes());
    nonce
}

/// `(ck, h)` plus an optional handshake AEAD, updated by `mix_hash`,
/// `mix_key`, `encrypt_and_hash`, and `decrypt_and_hash` as the XX pattern's
/// tokens are processed in order.
pub struct SymmetricState {
    ck: [u8; 32],
    h: [u8; 32],
    cipher: Option<HandshakeCipher>,
}

impl SymmetricState {
    /// Initialize per Noise §5.2: `h = SHA256(protocol_name)`, `ck = h`,
    /// then mix in the prologue (empty for this protocol).
    pub fn initialize() -> Self {
        let h: [u8; 32] = Sha256::digest(PROTOCOL_NAME).into();
        let ck = h;
        let mut state = Self { ck, h, cipher: None };
        state.mix_hash(&[]);
        state
    }

    pub fn h(&self) -> &[u8; 32] {
        &self.h
    }

    /// `h = SHA256(h || data)`.
    pub fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.h);
        hasher.update(data);
        self.h = hasher.finalize().into();
    }

    /// `(ck, temp_k) = HKDF(ck, input_key_material, 2)`; the handshake AEAD
    /// is (re)keyed with `temp_k` and its nonce reset to zero.
    pub fn mix_key(&mut self, input_key_material: &[u8]) {
        let (ck, temp_k) = hkdf2(&self.ck, input_key_material);
        self.ck = ck;
        self.cipher = Some(HandshakeCipher { key: temp_k, nonce: 0 });
    }

    /// Encrypt (if a handshake key has been established) or pass through
    /// `plaintext`, mixing the result into `h` either way.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let out = match &mut self.cipher {
            Some(c) => c.encrypt(&self.h, plaintext)?,
            None => plaintext.to_vec(),
        };
        self.mix_hash(&out);
        Ok(out)
    }

    /// Inverse of [`Self::encrypt_and_hash`].
    pub fn decrypt_and_hash(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let out = match &mut self.cipher {
            Some(c) => c.decrypt(&self.h, data)?,
            None => data.to_vec(),
        };
        self.mix_hash(data);
        Ok(out)
    }

    /// `Split()`: derive the pair of transport keys from the final chaining
    /// key. `k1` is the initiator-to-responder key, `k2` is
    /// responder-to-initiator.
    pub fn split(&self) -> ([u8; 32], [u8; 32]) {
        hkdf2(&self.ck, &[])
    }
}

impl Drop for SymmetricState {
    fn drop(&mut self) {
        self.ck.zeroize();
        self.h.zeroize();
    }
}

/// `HKDF-SHA256(chaining_key, input_key_material)` expanded to two 32-byte
/// outputs, per Noise §4.3's two-output `HKDF`.
fn hkdf2(chaining_key: &[u8; 32], input_key_material: &[u8]) -> ([u8; 32], [u8; 32]) {
    let hk = Hkdf::<Sha256>::new(Some(chaining_key), input_key_material);
    let mut okm = [0u8; 64];
    hk.expand(&[], &mut okm)
        .expect("64 <= 255*HashLen for SHA-256");
    let mut out1 = [0u8; 32];
    let mut out2 = [0u8; 32];
    out1.copy_from_slice(&okm[..32]);
    out2.copy_from_slice(&okm[32..]);
    okm.zeroize();
    (out1, out2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_deterministic() {
        let a = SymmetricState::initialize();
        let b = SymmetricState::initialize();
        assert_eq!(a.h(), b.h());
    }

    #[test]
    fn test_mix_hash_changes_transcript() {
        let mut s = SymmetricState::initialize();
        let before = *s.h();
        s.mix_hash(b"some public key bytes");
        assert_ne!(before, *s.h());
    }

    #[test]
    fn test_encrypt_and_hash_without_key_is_passthrough() {
        let mut s = SymmetricState::initialize();
        let ct = s.encrypt_and_hash(b"payload").expect("no key set");
        assert_eq!(ct, b"payload");
    }

    #[test]
    fn test_encrypt_decrypt_and_hash_roundtrip_after_mix_key() {
        let mut s1 = SymmetricState::initialize();
        let mut s2 = SymmetricState::initialize();
        let ikm = [0x11u8; 32];
        s1.mix_key(&ikm);
        s2.mix_key(&ikm);

        let ct = s1.encrypt_and_hash(b"static key bytes").expect("encrypt");
        let pt = s2.decrypt_and_hash(&ct).expect("decrypt");
        assert_eq!(pt, b"static key bytes");
        assert_eq!(s1.h(), s2.h());
    }

    #[test]
    fn test_split_produces_distinct_keys() {
        let mut s = SymmetricState::initialize();
        s.mix_key(&[0x22u8; 32]);
        let (k1, k2) = s.split();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_split_agrees_across_two_states_with_same_history() {
        let mut s1 = SymmetricState::initialize();
        let mut s2 = SymmetricState::initialize();
        s1.mix_key(&[0x33u8; 32]);
        s2.mix_key(&[0x33u8; 32]);
        assert_eq!(s1.split(), s2.split());
    }
}
