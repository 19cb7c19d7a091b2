//! [`RelayController`]: decides whether, and after what jittered delay, a
//! received packet should be rebroadcast (§4.10).
//!
//! The scheduling *decision* lives here; actually sleeping and re-checking
//! dedup before transmitting is the caller's (the Mesh Service's)
//! responsibility, since only it owns the `running` flag that makes
//! cancellation on `stop()` possible (§5).

use fluxon_crypto::csprng;

/// Default base relay delay.
pub const DEFAULT_BASE_DELAY_MS: u64 = 50;
/// Default additional jitter range on top of the base delay.
pub const DEFAULT_MAX_JITTER_MS: u64 = 100;
/// TTL at or below which a packet is never relayed.
pub const MIN_RELAYABLE_TTL: u8 = 1;
/// Stricter cap on a handshake-type packet's relay hop count, if relayed
/// at all (handshake packets are not relayed beyond one hop in the default
/// profile — see `RelayController::decide`).
pub const HANDSHAKE_MAX_RELAY_TTL: u8 = 3;

/// The outcome of a relay policy decision (§4.10).
#[derive(Debug, PartialEq, Eq)]
pub enum RelayDecision {
    /// Do not relay this packet at all.
    Drop,
    /// Relay after `delay_ms` of jitter, with `ttl` already decremented
    /// and clamped to the configured maximum.
    Schedule { ttl: u8, delay_ms: u64 },
}

pub struct RelayController {
    max_ttl: u8,
    base_delay_ms: u64,
    max_jitter_ms: u64,
    relay_handshakes: bool,
}

impl RelayController {
    pub fn new(max_ttl: u8) -> Self {
        Self {
            max_ttl,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_jitter_ms: DEFAULT_MAX_JITTER_MS,
            relay_handshakes: false,
        }
    }

    /// Decide whether to relay a packet with the given `ttl`,
    /// `is_handshake` flag, and the node's current graph `degree`
    /// (number of fresh mutual neighbors).
    pub fn decide(&self, ttl: u8, is_handshake: bool, degree: usize) -> RelayDecision {
        if ttl <= MIN_RELAYABLE_TTL {
            return RelayDecision::Drop;
        }
        if is_handshake && !self.relay_handshakes {
            return RelayDecision::Drop;
        }
        if degree == 0 {
            return RelayDecision::Drop;
        }

        let mut next_ttl = ttl.saturating_sub(1).min(self.max_ttl);
        if is_handshake {
            next_ttl = next_ttl.min(HANDSHAKE_MAX_RELAY_TTL);
        }
        let delay_ms = csprng::jitter_ms(self.base_delay_ms, self.base_delay_ms + self.max_jitter_ms);
        RelayDecision::Schedule { ttl: next_ttl, delay_ms }
    }
}

impl Default for RelayController {
    fn default() -> Self {
        Self::new(fluxon_codec::packet::DEFAULT_MAX_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_one_is_not_relayed() {
        let controller = RelayController::default();
        assert_eq!(controller.decide(1, false, 3), RelayDecision::Drop);
    }

    #[test]
    fn test_ttl_zero_is_not_relayed() {
        let controller = RelayController::default();
        assert_eq!(controller.decide(0, false, 3), RelayDecision::Drop);
    }

    #[test]
    fn test_zero_degree_is_not_relayed() {
        let controller = RelayController::default();
        assert_eq!(controller.decide(5, false, 0), RelayDecision::Drop);
    }

    #[test]
    fn test_handshake_is_not_relayed_by_default() {
        let controller = RelayController::default();
        assert_eq!(controller.decide(5, true, 3), RelayDecision::Drop);
    }

    #[test]
    fn test_normal_packet_is_scheduled_with_decremented_ttl() {
        let controller = RelayController::default();
        let RelayDecision::Schedule { ttl, delay_ms } = controller.decide(5, false, 2) else {
            unreachable!("degree > 0 and ttl > 1 must schedule");
        };
        assert_eq!(ttl, 4);
        assert!((DEFAULT_BASE_DELAY_MS..=DEFAULT_BASE_DELAY_MS + DEFAULT_MAX_JITTER_MS).contains(&delay_ms));
    }

    #[test]
    fn test_ttl_clamped_to_max() {
        let controller = RelayController::new(3);
        let RelayDecision::Schedule { ttl, .. } = controller.decide(7, false, 1) else {
            unreachable!("degree > 0 and ttl > 1 must schedule");
        };
        assert_eq!(ttl, 3);
    }

    #[test]
    fn test_jitter_is_nondeterministic() {
        let controller = RelayController::default();
        let delays: Vec<u64> = (0..20)
            .map(|_| match controller.decide(5, false, 1) {
                RelayDecision::Schedule { delay_ms, .. } => delay_ms,
                RelayDecision::Drop => 0,
            })
            .collect();
        assert!(delays.iter().any(|d| *d != delays[0]));
    }
}
