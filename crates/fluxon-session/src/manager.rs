//! [`SessionManager`]: the bounded table of per-peer [`PeerSlot`] state
//! machines, driving each peer's XX handshake and holding its transport
//! ciphers once established.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use fluxon_crypto::ed25519::{SigningKey, VerifyingKey};
use fluxon_crypto::x25519::{X25519PublicKey, X25519StaticSecret};
use fluxon_noise::cipherstate::{RecvCipher, SendCipher};
use fluxon_noise::handshake::HandshakeState;
use fluxon_types::PeerId;
use lru::LruCache;

use crate::ratelimit::SlidingWindowLimiter;
use crate::trust::TrustStore;
use crate::{
    SessionError, DEFAULT_GLOBAL_HANDSHAKE_LIMIT, DEFAULT_GLOBAL_HANDSHAKE_WINDOW, DEFAULT_PEER_CAPACITY,
    DEFAULT_PER_PEER_HANDSHAKE_LIMIT, DEFAULT_PER_PEER_HANDSHAKE_WINDOW, DEFAULT_REKEY_THRESHOLD,
};

/// An established post-handshake session with one peer.
pub struct EstablishedSession {
    send: SendCipher,
    recv: RecvCipher,
    remote_static: X25519PublicKey,
    remote_signing_key: VerifyingKey,
    established_at: Instant,
}

impl EstablishedSession {
    pub fn remote_static(&self) -> &X25519PublicKey {
        &self.remote_static
    }

    pub fn remote_signing_key(&self) -> &VerifyingKey {
        &self.remote_signing_key
    }

    pub fn established_at(&self) -> Instant {
        self.established_at
    }

    pub fn messages_sent(&self) -> u32 {
        self.send.messages_sent()
    }
}

/// The lifecycle state of one peer's session slot.
pub enum PeerState {
    /// No handshake has been started or received yet.
    Idle,
    /// A handshake is in progress; holds the in-flight Noise state.
    Handshaking(HandshakeState),
    /// The handshake completed and transport ciphers are live.
    Established(EstablishedSession),
}

/// One peer's handshake/session state plus its rate-limiting bookkeeping.
pub struct PeerSlot {
    pub state: PeerState,
    handshake_limiter: SlidingWindowLimiter,
}

impl PeerSlot {
    fn new(handshake_limit: usize, handshake_window: Duration) -> Self {
        Self {
            state: PeerState::Idle,
            handshake_limiter: SlidingWindowLimiter::new(handshake_limit, handshake_window),
        }
    }
}

impl Default for PeerSlot {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PEER_HANDSHAKE_LIMIT, DEFAULT_PER_PEER_HANDSHAKE_WINDOW)
    }
}

/// Owns this node's long-lived identity, the bounded peer-slot table, and
/// the TOFU trust store, and drives every peer's handshake and transport
/// cipher through to completion or teardown.
pub struct SessionManager {
    local_static: X25519StaticSecret,
    local_signing: SigningKey,
    peers: LruCache<PeerId, PeerSlot>,
    trust: TrustStore,
    rekey_threshold: u32,
    per_peer_handshake_limit: usize,
    per_peer_handshake_window: Duration,
    global_handshake_limiter: SlidingWindowLimiter,
}

impl SessionManager {
    pub fn new(local_static: X25519StaticSecret, local_signing: SigningKey) -> Self {
        Self::with_config(
            local_static,
            local_signing,
            DEFAULT_PEER_CAPACITY,
            DEFAULT_REKEY_THRESHOLD,
            DEFAULT_PER_PEER_HANDSHAKE_LIMIT,
            DEFAULT_PER_PEER_HANDSHAKE_WINDOW,
            DEFAULT_GLOBAL_HANDSHAKE_LIMIT,
            DEFAULT_GLOBAL_HANDSHAKE_WINDOW,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_config(
        local_static: X25519StaticSecret,
        local_signing: SigningKey,
        capacity: usize,
        rekey_threshold: u32,
        per_peer_handshake_limit: usize,
        per_peer_handshake_window: Duration,
        global_handshake_limit: usize,
        global_handshake_window: Duration,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity.max(1) is never zero");
        Self {
            local_static,
            local_signing,
            peers: LruCache::new(capacity),
            trust: TrustStore::new(capacity.get()),
            rekey_threshold,
            per_peer_handshake_limit,
            per_peer_handshake_window,
            global_handshake_limiter: SlidingWindowLimiter::new(global_handshake_limit, global_handshake_window),
        }
    }

    pub fn local_static_public(&self) -> X25519PublicKey {
        self.local_static.public_key()
    }

    pub fn trust_store(&mut self) -> &mut TrustStore {
        &mut self.trust
    }

    /// The Ed25519 signing key pinned for `peer`, if any contact has been
    /// made.
    pub fn pinned_signing_key(&mut self, peer: &PeerId) -> Option<[u8; 32]> {
        self.trust.pinned_key(peer)
    }

    /// Remove `peer`'s slot entirely (state and rate-limit bookkeeping),
    /// without touching its pinned trust.
    pub fn remove_session(&mut self, peer: &PeerId) {
        self.peers.pop(peer);
    }

    /// Drop every peer slot and every pinned trust entry.
    pub fn clear(&mut self) {
        self.peers.clear();
        self.trust = TrustStore::new(self.peers.cap().get());
    }

    fn slot_mut(&mut self, peer: PeerId) -> &mut PeerSlot {
        if !self.peers.contains(&peer) {
            let slot = PeerSlot::new(self.per_peer_handshake_limit, self.per_peer_handshake_window);
            self.peers.put(peer, slot);
        }
        self.peers.get_mut(&peer).expect("just inserted")
    }

    fn check_rate_limit(&mut self, peer: PeerId) -> crate::Result<()> {
        let now = Instant::now();
        if !self.global_handshake_limiter.try_acquire(now) {
            return Err(SessionError::RateLimited);
        }
        let slot = self.slot_mut(peer);
        if !slot.handshake_limiter.try_acquire(now) {
            return Err(SessionError::RateLimited);
        }
        Ok(())
    }

    /// Begin a handshake as initiator. Returns the wire bytes of message 1.
    pub fn initiate_handshake(&mut self, peer: PeerId) -> crate::Result<Vec<u8>> {
        self.check_rate_limit(peer)?;
        let mut hs = HandshakeState::new_initiator(self.local_static.clone());
        let msg1 = hs.write_message1()?;
        self.slot_mut(peer).state = PeerState::Handshaking(hs);
        Ok(msg1)
    }

    /// Respond to an inbound message 1 as responder. Returns the wire bytes
    /// of message 2, which carries our signing public key as payload.
    pub fn accept_handshake_init(&mut self, peer: PeerId, msg1: &[u8]) -> crate::Result<Vec<u8>> {
        self.check_rate_limit(peer)?;
        let mut hs = HandshakeState::new_responder(self.local_static.clone());
        hs.read_message1(msg1)?;
        let signing_pub = self.local_signing.verifying_key().to_bytes();
        let msg2 = hs.write_message2(&signing_pub)?;
        self.slot_mut(peer).state = PeerState::Handshaking(hs);
        Ok(msg2)
    }

    /// Process an inbound message 2 as initiator: pins the responder's
    /// signing key (TOFU), then returns the wire bytes of message 3.
    pub fn accept_handshake_response(&mut self, peer: PeerId, msg2: &[u8]) -> crate::Result<Vec<u8>> {
        let mut hs = match std::mem::replace(&mut self.slot_mut(peer).state, PeerState::Idle) {
            PeerState::Handshaking(hs) => hs,
            other => {
                self.slot_mut(peer).state = other;
                return Err(SessionError::WrongState);
            }
        };

        let remote_payload = hs.read_message2(msg2)?;
        let remote_signing_key = parse_verifying_key(&remote_payload)?;
        self.trust.check_and_pin(peer, &remote_signing_key)?;

        let signing_pub = self.local_signing.verifying_key().to_bytes();
        let msg3 = hs.write_message3(&signing_pub)?;
        let output = hs.finish()?;

        self.slot_mut(peer).state = PeerState::Established(EstablishedSession {
            send: SendCipher::new(output.send_key),
            recv: RecvCipher::new(output.recv_key),
            remote_static: output.remote_static,
            remote_signing_key,
            established_at: Instant::now(),
        });
        Ok(msg3)
    }

    /// Process an inbound message 3 as responder: pins the initiator's
    /// signing key (TOFU) and establishes the session.
    pub fn accept_handshake_final(&mut self, peer: PeerId, msg3: &[u8]) -> crate::Result<()> {
        let mut hs = match std::mem::replace(&mut self.slot_mut(peer).state, PeerState::Idle) {
            PeerState::Handshaking(hs) => hs,
            other => {
                self.slot_mut(peer).state = other;
                return Err(SessionError::WrongState);
            }
        };

        let remote_payload = hs.read_message3(msg3)?;
        let remote_signing_key = parse_verifying_key(&remote_payload)?;
        self.trust.check_and_pin(peer, &remote_signing_key)?;

        let output = hs.finish()?;
        self.slot_mut(peer).state = PeerState::Established(EstablishedSession {
            send: SendCipher::new(output.send_key),
            recv: RecvCipher::new(output.recv_key),
            remote_static: output.remote_static,
            remote_signing_key,
            established_at: Instant::now(),
        });
        Ok(())
    }

    fn established_mut(&mut self, peer: &PeerId) -> crate::Result<&mut EstablishedSession> {
        match self.peers.get_mut(peer) {
            Some(slot) => match &mut slot.state {
                PeerState::Established(session) => Ok(session),
                _ => Err(SessionError::WrongState),
            },
            None => Err(SessionError::UnknownPeer),
        }
    }

    /// Encrypt an outbound application payload for `peer`'s established
    /// session.
    ///
    /// Returns `Ok(None)` instead of encrypting once the session has carried
    /// `rekey_threshold` messages: the session is torn down as a side effect
    /// and the caller must drive a fresh handshake before sending again.
    pub fn encrypt(&mut self, peer: &PeerId, aad: &[u8], plaintext: &[u8]) -> crate::Result<Option<(u32, Vec<u8>)>> {
        if self.needs_rekey(peer) {
            self.tear_down(peer);
            return Ok(None);
        }
        let session = self.established_mut(peer)?;
        Ok(Some(session.send.encrypt(aad, plaintext)?))
    }

    /// Decrypt an inbound transport message for `peer`'s established
    /// session.
    ///
    /// Returns `Ok(None)` on any AEAD failure (tampering, replay, or an
    /// out-of-window counter) rather than an error: the session is torn
    /// down as a side effect, since a cipher in this state cannot be
    /// trusted to decrypt further messages, but a single bad frame from an
    /// attacker is not itself exceptional.
    pub fn decrypt(&mut self, peer: &PeerId, counter: u32, aad: &[u8], ciphertext: &[u8]) -> crate::Result<Option<Vec<u8>>> {
        let session = self.established_mut(peer)?;
        match session.recv.decrypt(counter, aad, ciphertext) {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(_) => {
                self.tear_down(peer);
                Ok(None)
            }
        }
    }

    /// Whether `peer`'s session has sent enough messages that it should be
    /// torn down and re-established.
    pub fn needs_rekey(&mut self, peer: &PeerId) -> bool {
        match self.established_mut(peer) {
            Ok(session) => session.messages_sent() >= self.rekey_threshold,
            Err(_) => false,
        }
    }

    /// Tear down `peer`'s session (e.g. after a rekey threshold trip or a
    /// fatal decrypt failure), without clearing its pinned trust.
    pub fn tear_down(&mut self, peer: &PeerId) {
        if let Some(slot) = self.peers.get_mut(peer) {
            slot.state = PeerState::Idle;
        }
    }

    pub fn is_established(&mut self, peer: &PeerId) -> bool {
        matches!(
            self.peers.get(peer).map(|s| &s.state),
            Some(PeerState::Established(_))
        )
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

fn parse_verifying_key(payload: &[u8]) -> crate::Result<VerifyingKey> {
    let bytes: [u8; 32] = payload.try_into().map_err(|_| SessionError::InvalidSigningKey)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| SessionError::InvalidSigningKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_manager() -> (SessionManager, X25519PublicKey) {
        let static_secret = X25519StaticSecret::random();
        let public = static_secret.public_key();
        let signing = SigningKey::generate();
        (SessionManager::new(static_secret, signing), public)
    }

    #[test]
    fn test_full_handshake_establishes_both_sides() {
        let (mut initiator_mgr, init_static_pub) = new_manager();
        let (mut responder_mgr, resp_static_pub) = new_manager();

        let init_peer = PeerId::from_static_public_key(&resp_static_pub);
        let resp_peer = PeerId::from_static_public_key(&init_static_pub);

        let msg1 = initiator_mgr.initiate_handshake(init_peer).expect("msg1");
        let msg2 = responder_mgr.accept_handshake_init(resp_peer, &msg1).expect("msg2");
        let msg3 = initiator_mgr
            .accept_handshake_response(init_peer, &msg2)
            .expect("msg3");
        responder_mgr
            .accept_handshake_final(resp_peer, &msg3)
            .expect("final");

        assert!(initiator_mgr.is_established(&init_peer));
        assert!(responder_mgr.is_established(&resp_peer));
    }

    #[test]
    fn test_established_sessions_interoperate() {
        let (mut initiator_mgr, init_static_pub) = new_manager();
        let (mut responder_mgr, resp_static_pub) = new_manager();
        let init_peer = PeerId::from_static_public_key(&resp_static_pub);
        let resp_peer = PeerId::from_static_public_key(&init_static_pub);

        let msg1 = initiator_mgr.initiate_handshake(init_peer).expect("msg1");
        let msg2 = responder_mgr.accept_handshake_init(resp_peer, &msg1).expect("msg2");
        let msg3 = initiator_mgr
            .accept_handshake_response(init_peer, &msg2)
            .expect("msg3");
        responder_mgr
            .accept_handshake_final(resp_peer, &msg3)
            .expect("final");

        let (counter, ct) = initiator_mgr
            .encrypt(&init_peer, b"aad", b"hello mesh")
            .expect("encrypt")
            .expect("session not due for rekey");
        let pt = responder_mgr
            .decrypt(&resp_peer, counter, b"aad", &ct)
            .expect("decrypt")
            .expect("aead should verify");
        assert_eq!(pt, b"hello mesh");
    }

    #[test]
    fn test_repeat_handshake_attempt_rate_limited() {
        let (mut initiator_mgr, _init_static_pub) = new_manager();
        let peer = PeerId::from_bytes([9u8; 32]);
        for _ in 0..DEFAULT_PER_PEER_HANDSHAKE_LIMIT {
            initiator_mgr.initiate_handshake(peer).expect("attempt within budget");
        }
        let result = initiator_mgr.initiate_handshake(peer);
        assert!(matches!(result, Err(SessionError::RateLimited)));
    }

    #[test]
    fn test_global_handshake_rate_limit_spans_peers() {
        let (mut initiator_mgr, _init_static_pub) = new_manager();
        for i in 0..DEFAULT_GLOBAL_HANDSHAKE_LIMIT {
            let peer = PeerId::from_bytes([i as u8; 32]);
            initiator_mgr.initiate_handshake(peer).expect("attempt within global budget");
        }
        let one_more = PeerId::from_bytes([250u8; 32]);
        let result = initiator_mgr.initiate_handshake(one_more);
        assert!(matches!(result, Err(SessionError::RateLimited)));
    }

    #[test]
    fn test_encrypt_before_established_fails() {
        let (mut mgr, _pub) = new_manager();
        let peer = PeerId::from_bytes([1u8; 32]);
        assert!(matches!(
            mgr.encrypt(&peer, b"", b"x"),
            Err(SessionError::UnknownPeer)
        ));
    }

    #[test]
    fn test_rekey_threshold_trips() {
        let static_secret = X25519StaticSecret::random();
        let signing = SigningKey::generate();
        let mut mgr = SessionManager::with_config(
            static_secret,
            signing,
            10,
            2,
            DEFAULT_PER_PEER_HANDSHAKE_LIMIT,
            DEFAULT_PER_PEER_HANDSHAKE_WINDOW,
            DEFAULT_GLOBAL_HANDSHAKE_LIMIT,
            DEFAULT_GLOBAL_HANDSHAKE_WINDOW,
        );
        let peer = PeerId::from_bytes([2u8; 32]);

        // Force an established session directly for threshold testing.
        let responder_static = X25519StaticSecret::random();
        let responder_signing = SigningKey::generate();
        let mut responder_mgr = SessionManager::new(responder_static, responder_signing);
        let resp_peer = PeerId::from_static_public_key(&mgr.local_static_public());

        let msg1 = mgr.initiate_handshake(peer).expect("msg1");
        let msg2 = responder_mgr.accept_handshake_init(resp_peer, &msg1).expect("msg2");
        let msg3 = mgr.accept_handshake_response(peer, &msg2).expect("msg3");
        responder_mgr.accept_handshake_final(resp_peer, &msg3).expect("final");

        assert!(!mgr.needs_rekey(&peer));
        mgr.encrypt(&peer, b"", b"one")
            .expect("encrypt 1")
            .expect("session not yet due for rekey");
        mgr.encrypt(&peer, b"", b"two")
            .expect("encrypt 2")
            .expect("session not yet due for rekey");
        assert!(mgr.needs_rekey(&peer));

        // The next encrypt should tear the session down instead of sending.
        let result = mgr.encrypt(&peer, b"", b"three").expect("encrypt call itself succeeds");
        assert!(result.is_none());
        assert!(!mgr.is_established(&peer));
    }

    #[test]
    fn test_decrypt_failure_tears_down_session() {
        let (mut initiator_mgr, init_static_pub) = new_manager();
        let (mut responder_mgr, resp_static_pub) = new_manager();
        let init_peer = PeerId::from_static_public_key(&resp_static_pub);
        let resp_peer = PeerId::from_static_public_key(&init_static_pub);

        let msg1 = initiator_mgr.initiate_handshake(init_peer).expect("msg1");
        let msg2 = responder_mgr.accept_handshake_init(resp_peer, &msg1).expect("msg2");
        let msg3 = initiator_mgr
            .accept_handshake_response(init_peer, &msg2)
            .expect("msg3");
        responder_mgr
            .accept_handshake_final(resp_peer, &msg3)
            .expect("final");

        let (counter, mut ct) = initiator_mgr
            .encrypt(&init_peer, b"aad", b"hello mesh")
            .expect("encrypt")
            .expect("session not due for rekey");
        if let Some(byte) = ct.first_mut() {
            *byte ^= 0xFF;
        }
        let result = responder_mgr
            .decrypt(&resp_peer, counter, b"aad", &ct)
            .expect("decrypt call itself succeeds");
        assert!(result.is_none());
        assert!(!responder_mgr.is_established(&resp_peer));
    }

    #[test]
    fn test_remove_session_and_clear() {
        let (mut mgr, _pub) = new_manager();
        let peer = PeerId::from_bytes([5u8; 32]);
        mgr.initiate_handshake(peer).expect("msg1");
        assert_eq!(mgr.peer_count(), 1);
        mgr.remove_session(&peer);
        assert_eq!(mgr.peer_count(), 0);

        mgr.initiate_handshake(peer).expect("msg1 again");
        mgr.clear();
        assert_eq!(mgr.peer_count(), 0);
    }
}
