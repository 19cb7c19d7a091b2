//! OS-backed CSPRNG access for nonces, salts, ephemerals, and relay jitter.
//!
//! A single thin wrapper so call sites never reach for `rand::thread_rng()`
//! (PRNG, not guaranteed CSPRNG-backed on all platforms) directly.

use rand::{Rng, RngCore};

/// Fill `buf` with cryptographically secure random bytes.
pub fn fill_bytes(buf: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(buf);
}

/// Generate a random 16-byte value (salts, message ids).
pub fn random_16() -> [u8; 16] {
    let mut buf = [0u8; 16];
    fill_bytes(&mut buf);
    buf
}

/// Generate a random 32-byte value.
pub fn random_32() -> [u8; 32] {
    let mut buf = [0u8; 32];
    fill_bytes(&mut buf);
    buf
}

/// Draw a uniformly random jitter delay in `[min_ms, max_ms]` (inclusive).
///
/// Used by the relay controller to schedule non-deterministic rebroadcast
/// delays; a deterministic delay would let colluding observers correlate
/// relays across the mesh.
pub fn jitter_ms(min_ms: u64, max_ms: u64) -> u64 {
    if max_ms <= min_ms {
        return min_ms;
    }
    rand::rngs::OsRng.gen_range(min_ms..=max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_16_varies() {
        assert_ne!(random_16(), random_16());
    }

    #[test]
    fn test_random_32_varies() {
        assert_ne!(random_32(), random_32());
    }

    #[test]
    fn test_jitter_within_bounds() {
        for _ in 0..200 {
            let j = jitter_ms(50, 100);
            assert!((50..=100).contains(&j));
        }
    }

    #[test]
    fn test_jitter_degenerate_range() {
        assert_eq!(jitter_ms(50, 50), 50);
        assert_eq!(jitter_ms(80, 10), 80);
    }
}
