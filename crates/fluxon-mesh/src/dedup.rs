//! [`Deduplicator`]: the single authority for packet-id admission (§4.7).
//! A packet that passes [`Deduplicator::check_and_insert`] is the only kind
//! the rest of the pipeline is allowed to deliver or relay.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use fluxon_codec::PacketId;
use lru::LruCache;

/// Default bounded capacity of the dedup set.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default time-to-live for an entry before it is eligible for eviction.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Bounded, time-expiring set of packet ids already admitted.
///
/// Backed by `lru::LruCache`, which gives O(1) insert/evict with no
/// tombstones to compact — the 25%-tombstone-fraction compaction trigger
/// `spec.md` §4.7 describes for a generation-counter-based ring buffer has
/// no counterpart here: the LRU crate's intrusive linked list already
/// reclaims a popped slot immediately, so there is nothing to compact.
pub struct Deduplicator {
    seen: LruCache<PacketId, (Instant, u64)>,
    ttl: Duration,
}

impl Deduplicator {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity.max(1) is never zero");
        Self {
            seen: LruCache::new(capacity),
            ttl,
        }
    }

    /// Check `id` for membership and admit it if new or expired.
    ///
    /// If `id` is present and not yet expired, returns `true` (duplicate)
    /// without touching insertion order, but bumps its re-sighting count so
    /// [`Deduplicator::seen_again_since`] can tell a relay scheduler that a
    /// second path delivered the same id while it was waiting out jitter.
    /// Otherwise records `id` at `now` (moving it to the most-recently-used
    /// end) and returns `false`, then evicts from the least-recently-used
    /// end while the oldest entry is past its TTL or the set exceeds
    /// capacity.
    pub fn check_and_insert(&mut self, id: &PacketId, now: Instant) -> bool {
        if let Some((inserted_at, hits)) = self.seen.peek_mut(id) {
            if now.saturating_duration_since(*inserted_at) <= self.ttl {
                *hits += 1;
                return true;
            }
        }
        self.seen.put(id.clone(), (now, 0));
        self.evict_stale(now);
        false
    }

    /// Re-sighting count recorded for `id` since it was first admitted, or
    /// `None` if it is not currently tracked (evicted or never seen).
    pub fn hit_count(&self, id: &PacketId) -> Option<u64> {
        self.seen.peek(id).map(|(_, hits)| *hits)
    }

    fn evict_stale(&mut self, now: Instant) {
        while let Some((_, (inserted_at, _))) = self.seen.peek_lru() {
            let expired = now.saturating_duration_since(*inserted_at) > self.ttl;
            if expired || self.seen.len() > self.seen.cap().get() {
                self.seen.pop_lru();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}
