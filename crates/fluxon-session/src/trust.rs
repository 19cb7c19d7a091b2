//! Trust-on-first-use pinning of a peer's Ed25519 signing public key,
//! independent of the Noise session's X25519 static key. Kept as its own
//! bounded table (rather than folded into [`crate::manager::PeerSlot`]) so a
//! pin survives session teardown, rekeys, and transport reconnects — only
//! eviction from the LRU or an explicit [`TrustStore::forget`] clears it.

use std::num::NonZeroUsize;

use fluxon_crypto::ed25519::VerifyingKey;
use fluxon_types::PeerId;
use lru::LruCache;

use crate::{SessionError, DEFAULT_PEER_CAPACITY};

/// Bounded map from [`PeerId`] to the Ed25519 signing key pinned for it.
pub struct TrustStore {
    pinned: LruCache<PeerId, [u8; 32]>,
}

impl TrustStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity.max(1) is never zero");
        Self {
            pinned: LruCache::new(capacity),
        }
    }

    /// On first contact with `peer`, pin `signing_key` and succeed. On
    /// subsequent contact, succeed only if `signing_key` matches the pinned
    /// key in constant time; otherwise return [`SessionError::KeyMismatch`]
    /// without updating the pin.
    pub fn check_and_pin(&mut self, peer: PeerId, signing_key: &VerifyingKey) -> crate::Result<()> {
        let incoming = signing_key.to_bytes();
        if let Some(existing) = self.pinned.get(&peer) {
            if fluxon_crypto::constant_time::ct_eq(existing, &incoming) {
                return Ok(());
            }
            return Err(SessionError::KeyMismatch);
        }
        self.pinned.put(peer, incoming);
        Ok(())
    }

    /// The currently pinned key for `peer`, if any.
    pub fn pinned_key(&mut self, peer: &PeerId) -> Option<[u8; 32]> {
        self.pinned.get(peer).copied()
    }

    /// Remove any pin for `peer`, e.g. after the user explicitly resets
    /// trust for a contact.
    pub fn forget(&mut self, peer: &PeerId) {
        self.pinned.pop(peer);
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}

impl Default for TrustStore {
    fn default() -> Self {
        Self::new(DEFAULT_PEER_CAPACITY)
    }
}
