//! Constant-time comparison for key material, MAC tags, and signing-key
//! fingerprints.
//!
//! Ordinary `==` on byte slices short-circuits on the first mismatching
//! byte, which leaks timing information proportional to the length of the
//! matching prefix. Anything that compares secret-derived bytes (pinned
//! signing keys, session keys, AEAD tags) must go through [`ct_eq`] instead.
//! Routing/dedup/topology lookups are not secret-dependent and use ordinary
//! equality.

use subtle::ConstantTimeEq;

/// Compare two byte slices in constant time. Returns `false` immediately
/// (non-constant-time) if the lengths differ, since length is not secret.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
