//! [`GossipSync`]: the bounded seen-id set and the rate-limited sync
//! request/response exchange used to backfill packets a peer missed (§4.9).

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use fluxon_codec::PacketId;
use fluxon_session::ratelimit::SlidingWindowLimiter;
use fluxon_types::PeerId;
use lru::LruCache;

/// Bounded capacity of the seen-ids set.
pub const DEFAULT_SEEN_CAPACITY: usize = 1000;

/// Maximum number of ids returned from a single sync response.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Per-peer sync-request rate limit: at most this many requests...
pub const DEFAULT_PER_PEER_REQUEST_LIMIT: usize = 3;
/// ...per this sliding window.
pub const DEFAULT_PER_PEER_REQUEST_WINDOW: Duration = Duration::from_secs(60);

/// Bound on the per-peer rate-limit table.
pub const DEFAULT_PEER_TABLE_CAPACITY: usize = 200;

/// Global sync-response budget: at most this many response packets...
pub const DEFAULT_GLOBAL_RESPONSE_LIMIT: usize = 50;
/// ...per this sliding window, summed across all peers.
pub const DEFAULT_GLOBAL_RESPONSE_WINDOW: Duration = Duration::from_secs(60);

/// `peer_has_ids` larger than this multiple of the seen-id capacity is
/// rejected outright rather than processed.
pub const MAX_PEER_HAS_IDS_MULTIPLE: usize = 2;

/// Reasons [`GossipSync::handle_sync_request`] may refuse to answer.
#[derive(Debug, PartialEq, Eq)]
pub enum SyncRejection {
    /// `peer_has_ids` exceeded `2 * seen_capacity`.
    TooManyClaimedIds,
    /// The requesting peer exceeded its per-peer request budget.
    PeerRateLimited,
    /// The global response budget for the current window is exhausted.
    GlobalRateLimited,
}

/// Bounded seen-id set (insertion-ordered LRU) plus the rate-limited sync
/// exchange built on top of it.
pub struct GossipSync {
    seen: LruCache<PacketId, ()>,
    seen_capacity: usize,
    batch_size: usize,
    per_peer_requests: LruCache<PeerId, SlidingWindowLimiter>,
    per_peer_limit: usize,
    per_peer_window: Duration,
    global_responses: SlidingWindowLimiter,
}

impl GossipSync {
    pub fn new(seen_capacity: usize, batch_size: usize) -> Self {
        let cap = NonZeroUsize::new(seen_capacity.max(1)).expect("capacity.max(1) is never zero");
        let peer_table_cap =
            NonZeroUsize::new(DEFAULT_PEER_TABLE_CAPACITY).expect("constant capacity is never zero");
        Self {
            seen: LruCache::new(cap),
            seen_capacity,
            batch_size,
            per_peer_requests: LruCache::new(peer_table_cap),
            per_peer_limit: DEFAULT_PER_PEER_REQUEST_LIMIT,
            per_peer_window: DEFAULT_PER_PEER_REQUEST_WINDOW,
            global_responses: SlidingWindowLimiter::new(DEFAULT_GLOBAL_RESPONSE_LIMIT, DEFAULT_GLOBAL_RESPONSE_WINDOW),
        }
    }

    /// Record that `id` has been fully verified and admitted. Must be
    /// called only after full verification (§4.9) — calling it earlier
    /// would let an attacker use gossip presence as an oracle for whether
    /// a forged packet was dropped before verification completed.
    pub fn on_packet_seen(&mut self, id: PacketId) {
        self.seen.put(id, ());
    }

    /// Compute the ids `from_peer` is missing, i.e. `local_seen \
    /// peer_has_ids`, capped to [`GossipSync::batch_size`] entries,
    /// honoring the per-peer and global rate budgets.
    pub fn handle_sync_request(
        &mut self,
        from_peer: PeerId,
        peer_has_ids: &HashSet<PacketId>,
        now: Instant,
    ) -> Result<Vec<PacketId>, SyncRejection> {
        if peer_has_ids.len() > self.seen_capacity * MAX_PEER_HAS_IDS_MULTIPLE {
            return Err(SyncRejection::TooManyClaimedIds);
        }

        if !self.global_responses.try_acquire(now) {
            return Err(SyncRejection::GlobalRateLimited);
        }

        if !self.per_peer_requests.contains(&from_peer) {
            self.per_peer_requests.put(
                from_peer,
                SlidingWindowLimiter::new(self.per_peer_limit, self.per_peer_window),
            );
        }
        let limiter = self.per_peer_requests.get_mut(&from_peer).expect("just inserted");
        if !limiter.try_acquire(now) {
            return Err(SyncRejection::PeerRateLimited);
        }

        let missing: Vec<PacketId> = self
            .seen
            .iter()
            .map(|(id, _)| id.clone())
            .filter(|id| !peer_has_ids.contains(id))
            .take(self.batch_size)
            .collect();
        Ok(missing)
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }
}

impl Default for GossipSync {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_CAPACITY, DEFAULT_BATCH_SIZE)
    }
}
