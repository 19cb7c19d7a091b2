//! Domain-separated BLAKE2b hashing.
//!
//! BLAKE2b is used for two distinct purposes in Fluxon, kept separate by a
//! domain tag prepended to the hash input rather than by algorithm choice:
//!
//! - [`peer_id`] — `PeerId = BLAKE2b-256(static X25519 public key)`.
//! - [`group_id`] — `group_id = BLAKE2b-128("fluxon-group-id" || group_key || salt)`.
//!
//! Mixing an unrelated domain tag into either call is a protocol violation;
//! the two functions below are the only sanctioned entry points.

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;

/// Tag prefixed to the Argon2id output and salt when deriving a group id.
pub const GROUP_ID_TAG: &[u8] = b"fluxon-group-id";

/// Compute a BLAKE2b hash of `data` with the requested output length.
///
/// `output_len` must be in `1..=64`; this is a private helper, callers use
/// the fixed-width wrappers below.
fn hash_var(data: &[u8], output_len: usize) -> Vec<u8> {
    let mut hasher = Blake2bVar::new(output_len).expect("output_len in 1..=64");
    hasher.update(data);
    let mut out = vec![0u8; output_len];
    hasher
        .finalize_variable(&mut out)
        .expect("buffer sized to output_len");
    out
}

/// `PeerId = BLAKE2b-256(static_x25519_public_key)`.
pub fn peer_id(static_public_key: &[u8; 32]) -> [u8; 32] {
    let digest = hash_var(static_public_key, 32);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// `group_id = BLAKE2b-128(tag || derived_key[0..32] || salt)`.
pub fn group_id(derived_key: &[u8; 32], salt: &[u8; 16]) -> [u8; 16] {
    let mut input = Vec::with_capacity(GROUP_ID_TAG.len() + 32 + 16);
    input.extend_from_slice(GROUP_ID_TAG);
    input.extend_from_slice(derived_key);
    input.extend_from_slice(salt);
    let digest = hash_var(&input, 16);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    out
}

/// General-purpose BLAKE2b-256 hash, used by the cache-key derivation in
/// the group cipher (`BLAKE2b(passphrase || salt)`).
pub fn hash256(data: &[u8]) -> [u8; 32] {
    let digest = hash_var(data, 32);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
