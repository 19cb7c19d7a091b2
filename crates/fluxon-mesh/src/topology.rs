//! [`TopologyTracker`]: per-peer claimed-neighbor graph and the cached
//! breadth-first route computation over it (§4.8).
//!
//! The graph itself is never materialized as an adjacency matrix: an edge
//! `(A, B)` exists only at BFS-expansion time, and only when both `A` and
//! `B` currently, freshly, claim each other as a neighbor.

use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use fluxon_types::PeerId;
use lru::LruCache;

/// Claimed-neighbor entries older than this are not used as graph edges.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(60);

/// Maximum neighbors retained per peer after truncation.
pub const MAX_NEIGHBORS_PER_PEER: usize = 10;

/// Maximum hop count `compute_route` will search.
pub const MAX_HOPS_HARD_CAP: u8 = 7;

/// Hard cap on visited nodes during a single BFS, independent of graph size.
pub const DEFAULT_VISITED_CAP: usize = 500;

/// Bound on the number of peers whose claimed-neighbor set is retained.
pub const DEFAULT_PEER_CAPACITY: usize = 500;

/// Bound on cached route entries.
pub const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 500;

/// Default route cache entry lifetime.
pub const DEFAULT_ROUTE_CACHE_TTL: Duration = Duration::from_millis(1500);

struct NeighborEntry {
    neighbors: Vec<PeerId>,
    updated_at: Instant,
}

/// A cached `compute_route` result. `touches` is every PeerId appearing in
/// the route, source and target included, so an update to any one of them
/// invalidates exactly (and only) the cache entries it can affect.
struct CachedRoute {
    route: Option<Vec<PeerId>>,
    touches: HashSet<PeerId>,
    computed_at: Instant,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct RouteKey {
    source: PeerId,
    target: PeerId,
    max_hops: u8,
}

pub struct TopologyTracker {
    neighbors: LruCache<PeerId, NeighborEntry>,
    routes: LruCache<RouteKey, CachedRoute>,
    freshness_window: Duration,
    route_cache_ttl: Duration,
    visited_cap: usize,
}

impl TopologyTracker {
    pub fn new(peer_capacity: usize, route_cache_capacity: usize) -> Self {
        let peer_capacity = NonZeroUsize::new(peer_capacity.max(1)).expect("capacity.max(1) is never zero");
        let route_cache_capacity =
            NonZeroUsize::new(route_cache_capacity.max(1)).expect("capacity.max(1) is never zero");
        Self {
            neighbors: LruCache::new(peer_capacity),
            routes: LruCache::new(route_cache_capacity),
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            route_cache_ttl: DEFAULT_ROUTE_CACHE_TTL,
            visited_cap: DEFAULT_VISITED_CAP,
        }
    }

    /// Record `source`'s claimed neighbor set. Rejects the all-zero
    /// broadcast PeerId as a source outright; truncates `neighbors` to
    /// [`MAX_NEIGHBORS_PER_PEER`] before storing.
    ///
    /// Any cached route touching `source` is invalidated, since an edge
    /// incident to `source` may have just appeared or disappeared.
    pub fn update_neighbors(&mut self, source: PeerId, mut neighbors: Vec<PeerId>, now: Instant) -> bool {
        if source.is_broadcast() {
            return false;
        }
        neighbors.truncate(MAX_NEIGHBORS_PER_PEER);
        self.neighbors.put(
            source,
            NeighborEntry {
                neighbors,
                updated_at: now,
            },
        );
        self.invalidate_touching(&source);
        true
    }

    fn is_fresh(&self, entry: &NeighborEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.updated_at) <= self.freshness_window
    }

    fn claims(&self, peer: &PeerId, candidate: &PeerId, now: Instant) -> bool {
        match self.neighbors.peek(peer) {
            Some(entry) if self.is_fresh(entry, now) => entry.neighbors.contains(candidate),
            _ => false,
        }
    }

    fn mutual_edge(&self, a: &PeerId, b: &PeerId, now: Instant) -> bool {
        self.claims(a, b, now) && self.claims(b, a, now)
    }

    /// Breadth-first search bounded by `max_hops` (clamped to
    /// [`MAX_HOPS_HARD_CAP`]) and a hard visited-node cap, returning the
    /// sequence of intermediate hops between `source` and `target` (neither
    /// endpoint included), or `None` if unreachable within the bound.
    ///
    /// Results are cached by `(source, target, max_hops)` with a short TTL;
    /// a cache hit costs one lookup and no graph traversal.
    pub fn compute_route(&mut self, source: PeerId, target: PeerId, max_hops: u8, now: Instant) -> Option<Vec<PeerId>> {
        let max_hops = max_hops.min(MAX_HOPS_HARD_CAP);
        let key = RouteKey { source, target, max_hops };

        if let Some(cached) = self.routes.peek(&key) {
            if now.saturating_duration_since(cached.computed_at) <= self.route_cache_ttl {
                return cached.route.clone();
            }
        }

        let route = self.bfs(source, target, max_hops, now);
        let mut touches: HashSet<PeerId> = HashSet::new();
        touches.insert(source);
        touches.insert(target);
        if let Some(hops) = &route {
            touches.extend(hops.iter().copied());
        }
        self.routes.put(
            key,
            CachedRoute {
                route: route.clone(),
                touches,
                computed_at: now,
            },
        );
        route
    }

    fn bfs(&mut self, source: PeerId, target: PeerId, max_hops: u8, now: Instant) -> Option<Vec<PeerId>> {
        if source == target {
            return Some(Vec::new());
        }

        let mut visited: HashSet<PeerId> = HashSet::new();
        visited.insert(source);
        let mut queue: VecDeque<(PeerId, Vec<PeerId>)> = VecDeque::new();
        queue.push_back((source, Vec::new()));

        while let Some((current, path)) = queue.pop_front() {
            if path.len() as u8 >= max_hops {
                continue;
            }
            if visited.len() > self.visited_cap {
                break;
            }

            let candidates: Vec<PeerId> = match self.neighbors.peek(&current) {
                Some(entry) if self.is_fresh(entry, now) => entry.neighbors.clone(),
                _ => continue,
            };

            for next in candidates {
                if !self.mutual_edge(&current, &next, now) {
                    continue;
                }
                if next == target {
                    return Some(path.clone());
                }
                if visited.contains(&next) {
                    continue;
                }
                visited.insert(next);
                let mut next_path = path.clone();
                next_path.push(next);
                queue.push_back((next, next_path));
            }
        }
        None
    }

    /// Evict any cached route whose `touches` set includes `peer`.
    fn invalidate_touching(&mut self, peer: &PeerId) {
        let stale_keys: Vec<RouteKey> = self
            .routes
            .iter()
            .filter(|(_, cached)| cached.touches.contains(peer))
            .map(|(key, _)| *key)
            .collect();
        for key in stale_keys {
            self.routes.pop(&key);
        }
    }

    pub fn peer_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn route_cache_len(&self) -> usize {
        self.routes.len()
    }
}

impl Default for TopologyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PEER_CAPACITY, DEFAULT_ROUTE_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(byte: u8) -> PeerId {
        PeerId::from_bytes([byte; 32])
    }

    #[test]
    fn test_update_neighbors_rejects_broadcast_source() {
        let mut topo = TopologyTracker::default();
        let now = Instant::now();
        assert!(!topo.update_neighbors(PeerId::BROADCAST, vec![peer(1)], now));
        assert_eq!(topo.peer_count(), 0);
    }

    #[test]
    fn test_update_neighbors_truncates_to_max() {
        let mut topo = TopologyTracker::default();
        let now = Instant::now();
        let many: Vec<PeerId> = (0..20).map(peer).collect();
        topo.update_neighbors(peer(99), many, now);
        assert!(topo.claims(&peer(99), &peer(0), now));
    }

    #[test]
    fn test_route_requires_mutual_claim() {
        let mut topo = TopologyTracker::default();
        let now = Instant::now();
        // A claims B, but B does not claim A back: no edge.
        topo.update_neighbors(peer(1), vec![peer(2)], now);
        let route = topo.compute_route(peer(1), peer(2), 7, now);
        assert_eq!(route, None);
    }

    #[test]
    fn test_route_found_with_mutual_claim() {
        let mut topo = TopologyTracker::default();
        let now = Instant::now();
        topo.update_neighbors(peer(1), vec![peer(2)], now);
        topo.update_neighbors(peer(2), vec![peer(1)], now);
        let route = topo.compute_route(peer(1), peer(2), 7, now);
        assert_eq!(route, Some(Vec::new()));
    }

    #[test]
    fn test_multi_hop_route() {
        let mut topo = TopologyTracker::default();
        let now = Instant::now();
        topo.update_neighbors(peer(1), vec![peer(2)], now);
        topo.update_neighbors(peer(2), vec![peer(1), peer(3)], now);
        topo.update_neighbors(peer(3), vec![peer(2)], now);
        let route = topo.compute_route(peer(1), peer(3), 7, now);
        assert_eq!(route, Some(vec![peer(2)]));
    }

    #[test]
    fn test_route_respects_max_hops() {
        let mut topo = TopologyTracker::default();
        let now = Instant::now();
        topo.update_neighbors(peer(1), vec![peer(2)], now);
        topo.update_neighbors(peer(2), vec![peer(1), peer(3)], now);
        topo.update_neighbors(peer(3), vec![peer(2)], now);
        let route = topo.compute_route(peer(1), peer(3), 1, now);
        assert_eq!(route, None);
    }

    #[test]
    fn test_stale_neighbor_claim_not_used_as_edge() {
        let mut topo = TopologyTracker::default();
        let t0 = Instant::now();
        topo.update_neighbors(peer(1), vec![peer(2)], t0);
        topo.update_neighbors(peer(2), vec![peer(1)], t0);
        let later = t0 + Duration::from_secs(120);
        let route = topo.compute_route(peer(1), peer(2), 7, later);
        assert_eq!(route, None);
    }

    #[test]
    fn test_cache_hit_returns_same_result_without_recompute() {
        let mut topo = TopologyTracker::default();
        let now = Instant::now();
        topo.update_neighbors(peer(1), vec![peer(2)], now);
        topo.update_neighbors(peer(2), vec![peer(1)], now);
        let first = topo.compute_route(peer(1), peer(2), 7, now);
        let second = topo.compute_route(peer(1), peer(2), 7, now + Duration::from_millis(10));
        assert_eq!(first, second);
    }

    #[test]
    fn test_update_invalidates_cached_route_touching_peer() {
        let mut topo = TopologyTracker::default();
        let now = Instant::now();
        topo.update_neighbors(peer(1), vec![peer(2)], now);
        topo.update_neighbors(peer(2), vec![peer(1), peer(3)], now);
        topo.update_neighbors(peer(3), vec![peer(2)], now);
        let cached = topo.compute_route(peer(1), peer(3), 7, now);
        assert_eq!(cached, Some(vec![peer(2)]));
        assert_eq!(topo.route_cache_len(), 1);

        // peer(2) drops peer(3) as a neighbor: the cached route through it
        // must be invalidated, not silently served stale.
        topo.update_neighbors(peer(2), vec![peer(1)], now);
        assert_eq!(topo.route_cache_len(), 0);
    }
}
