//! [`MeshService`]: the orchestrator (C11) that drives the inbound pipeline
//! (§4.11) and the outbound `broadcast`/`send` surface, wiring together the
//! session manager, codec, dedup, topology, gossip, and relay layers behind
//! one [`Transport`].
//!
//! A shared state struct behind `Arc`, `tokio::sync::Mutex` guarding each
//! component, and a `tokio::select!`-driven run loop reacting to inbound
//! frames and transport lifecycle events.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use fluxon_codec::packet::{CodecConfig, MessageType, Packet};
use fluxon_codec::payload::DiscoveryPayload;
use fluxon_codec::signature::{sign_packet, verify_packet};
use fluxon_crypto::ed25519::{SigningKey, VerifyingKey};
use fluxon_crypto::x25519::X25519StaticSecret;
use fluxon_session::ratelimit::SlidingWindowLimiter;
use fluxon_session::{SessionError, SessionManager};
use fluxon_types::PeerId;
use lru::LruCache;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::dedup::Deduplicator;
use crate::events::MeshEvent;
use crate::gossip::GossipSync;
use crate::relay::{RelayController, RelayDecision};
use crate::topology::TopologyTracker;
use crate::transport::{PeerHandle, Transport, TransportChannels, TransportEvent};

/// Global inbound budget: at most this many frames per [`GLOBAL_RATE_WINDOW`],
/// summed across every transport handle (§5).
pub const DEFAULT_GLOBAL_FRAME_LIMIT: usize = 100;
pub const GLOBAL_RATE_WINDOW: Duration = Duration::from_secs(1);

/// Per-handle inbound budget, applied identically before and after
/// authentication (§5 allows "the same or stricter" for unauthenticated
/// handles, so one limiter keyed by handle covers both).
pub const DEFAULT_PER_HANDLE_FRAME_LIMIT: usize = 20;
pub const PER_HANDLE_RATE_WINDOW: Duration = Duration::from_secs(1);

/// Minimum gap between two admitted frames on the same handle (§5): the
/// 20/second budget alone would still let all 20 land in the same instant.
const MIN_HANDLE_FRAME_SPACING: Duration = Duration::from_millis(50);

/// Bound on the per-handle rate-limit table.
const HANDLE_TABLE_CAPACITY: usize = 500;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Default)]
struct StatsInner {
    packets_received: AtomicU64,
    packets_delivered: AtomicU64,
    packets_relayed: AtomicU64,
    packets_dropped: AtomicU64,
    peers_authenticated: AtomicU64,
}

/// A point-in-time snapshot of the Mesh Service's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub packets_received: u64,
    pub packets_delivered: u64,
    pub packets_relayed: u64,
    pub packets_dropped: u64,
    pub peers_authenticated: u64,
}

/// Which Noise handshake message a peer's next inbound handshake payload is
/// expected to be, tracked here because `SessionManager`'s public surface
/// exposes completion (`is_established`) but not which in-progress message
/// number a `Handshaking` slot is waiting on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandshakeExpect {
    /// We sent message 1 as initiator; the next inbound payload is message 2.
    AwaitingMsg2,
    /// We sent message 2 as responder; the next inbound payload is message 3.
    AwaitingMsg3,
}

/// Binds a transport handle to the PeerId it has claimed (via the packet
/// header `source_id` of its handshake) or proven (via the pinned signing
/// key once established). The claim is provisional until the handshake
/// completes; §4.11 step 6 then enforces it on every subsequent frame.
#[derive(Default)]
struct PeerDirectory {
    handle_to_peer: HashMap<PeerHandle, PeerId>,
    peer_to_handle: HashMap<PeerId, PeerHandle>,
}

impl PeerDirectory {
    fn bind(&mut self, handle: PeerHandle, peer: PeerId) {
        if let Some(previous) = self.handle_to_peer.insert(handle, peer) {
            if previous != peer {
                self.peer_to_handle.remove(&previous);
            }
        }
        self.peer_to_handle.insert(peer, handle);
    }

    fn unbind_handle(&mut self, handle: PeerHandle) {
        if let Some(peer) = self.handle_to_peer.remove(&handle) {
            self.peer_to_handle.remove(&peer);
        }
    }
}

/// The Mesh Service orchestrator. Generic over the concrete [`Transport`] so
/// no `dyn Transport` object or boxed future is ever required.
pub struct MeshService<T: Transport> {
    local_peer_id: PeerId,
    local_signing: SigningKey,
    transport: Arc<T>,
    codec_config: CodecConfig,

    sessions: Mutex<SessionManager>,
    dedup: Arc<Mutex<Deduplicator>>,
    topology: Mutex<TopologyTracker>,
    gossip: Mutex<GossipSync>,
    relay: RelayController,

    directory: Mutex<PeerDirectory>,
    handshake_progress: Mutex<HashMap<PeerId, HandshakeExpect>>,
    global_limiter: Mutex<SlidingWindowLimiter>,
    handle_limiters: Mutex<LruCache<PeerHandle, SlidingWindowLimiter>>,
    handle_last_admitted: Mutex<LruCache<PeerHandle, Instant>>,

    events_tx: mpsc::Sender<MeshEvent>,
    running: Arc<AtomicBool>,
    stats: StatsInner,
}

impl<T: Transport> MeshService<T> {
    pub fn new(
        local_static: X25519StaticSecret,
        local_signing: SigningKey,
        transport: T,
        codec_config: CodecConfig,
    ) -> (Arc<Self>, mpsc::Receiver<MeshEvent>) {
        let local_peer_id = PeerId::from_static_public_key(&local_static.public_key());
        let (events_tx, events_rx) = mpsc::channel(256);
        let handle_table_capacity =
            NonZeroUsize::new(HANDLE_TABLE_CAPACITY).expect("constant capacity is never zero");
        let session_signing = local_signing.clone();

        let service = Arc::new(Self {
            local_peer_id,
            local_signing,
            transport: Arc::new(transport),
            codec_config,
            sessions: Mutex::new(SessionManager::new(local_static, session_signing)),
            dedup: Arc::new(Mutex::new(Deduplicator::default())),
            topology: Mutex::new(TopologyTracker::default()),
            gossip: Mutex::new(GossipSync::default()),
            relay: RelayController::default(),
            directory: Mutex::new(PeerDirectory::default()),
            handshake_progress: Mutex::new(HashMap::new()),
            global_limiter: Mutex::new(SlidingWindowLimiter::new(
                DEFAULT_GLOBAL_FRAME_LIMIT,
                GLOBAL_RATE_WINDOW,
            )),
            handle_limiters: Mutex::new(LruCache::new(handle_table_capacity)),
            handle_last_admitted: Mutex::new(LruCache::new(handle_table_capacity)),
            events_tx,
            running: Arc::new(AtomicBool::new(false)),
            stats: StatsInner::default(),
        });
        (service, events_rx)
    }

    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            packets_received: self.stats.packets_received.load(Ordering::Relaxed),
            packets_delivered: self.stats.packets_delivered.load(Ordering::Relaxed),
            packets_relayed: self.stats.packets_relayed.load(Ordering::Relaxed),
            packets_dropped: self.stats.packets_dropped.load(Ordering::Relaxed),
            peers_authenticated: self.stats.peers_authenticated.load(Ordering::Relaxed),
        }
    }

    /// Start the underlying transport and mark the service running. Must be
    /// called before [`MeshService::run`].
    pub async fn start(&self) -> crate::Result<()> {
        self.running.store(true, Ordering::SeqCst);
        self.transport
            .start()
            .await
            .map_err(|_| crate::MeshError::Transport("transport failed to start".into()))
    }

    /// Clear the running flag (cancelling any relay task still in its jitter
    /// wait — §5) and stop the transport.
    pub async fn stop(&self) -> crate::Result<()> {
        self.running.store(false, Ordering::SeqCst);
        self.transport
            .stop()
            .await
            .map_err(|_| crate::MeshError::Transport("transport failed to stop".into()))
    }

    /// Bind a freshly connected transport handle to the peer we expect to
    /// find on the other end, and send the first Noise message as initiator.
    /// The binding is provisional: §4.11 step 6 tears the session back down
    /// if the peer that actually completes the handshake doesn't match.
    pub async fn connect(&self, handle: PeerHandle, expected_peer: PeerId) -> crate::Result<()> {
        self.directory.lock().await.bind(handle, expected_peer);
        let msg1 = self.sessions.lock().await.initiate_handshake(expected_peer)?;
        self.handshake_progress
            .lock()
            .await
            .insert(expected_peer, HandshakeExpect::AwaitingMsg2);
        let packet = Packet::new(
            MessageType::Handshake,
            1,
            0,
            now_ms(),
            self.local_peer_id,
            expected_peer,
            msg1,
        )?;
        self.transport
            .send_to(handle, packet.encode(), true)
            .await
            .map_err(|_| crate::MeshError::Transport("connect send failed".into()))
    }

    /// Drive the inbound frame and transport-event streams until the
    /// channels close or the running flag is cleared.
    pub async fn run(self: &Arc<Self>, mut channels: TransportChannels) {
        loop {
            tokio::select! {
                frame = channels.frames.recv() => {
                    match frame {
                        Some((handle, bytes)) => self.handle_inbound_frame(handle, bytes).await,
                        None => break,
                    }
                }
                event = channels.events.recv() => {
                    match event {
                        Some(event) => self.handle_transport_event(event).await,
                        None => break,
                    }
                }
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    async fn handle_transport_event(&self, event: TransportEvent) {
        if let TransportEvent::Disconnected(handle) = event {
            let peer = {
                let mut directory = self.directory.lock().await;
                let peer = directory.handle_to_peer.get(&handle).copied();
                directory.unbind_handle(handle);
                peer
            };
            if let Some(peer) = peer {
                self.sessions.lock().await.remove_session(&peer);
                self.handshake_progress.lock().await.remove(&peer);
                let _ = self.events_tx.send(MeshEvent::PeerLost(peer)).await;
            }
        }
    }

    async fn check_rate_limits(&self, handle: PeerHandle, now: Instant) -> bool {
        if !self.global_limiter.lock().await.try_acquire(now) {
            return false;
        }

        let mut last_admitted = self.handle_last_admitted.lock().await;
        if let Some(&previous) = last_admitted.peek(&handle) {
            if now.saturating_duration_since(previous) < MIN_HANDLE_FRAME_SPACING {
                return false;
            }
        }

        let mut limiters = self.handle_limiters.lock().await;
        if !limiters.contains(&handle) {
            limiters.put(
                handle,
                SlidingWindowLimiter::new(DEFAULT_PER_HANDLE_FRAME_LIMIT, PER_HANDLE_RATE_WINDOW),
            );
        }
        let limiter = limiters.get_mut(&handle).expect("just inserted");
        if !limiter.try_acquire(now) {
            return false;
        }

        last_admitted.put(handle, now);
        true
    }

    fn drop_packet(&self) {
        self.stats.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Steps 1-12 of §4.11 for one inbound frame.
    async fn handle_inbound_frame(&self, handle: PeerHandle, frame: Vec<u8>) {
        self.stats.packets_received.fetch_add(1, Ordering::Relaxed);

        // 1. Length bounds.
        if frame.is_empty() || frame.len() > crate::MAX_INBOUND_FRAME_LEN {
            debug!(handle = %handle, "dropping frame: length out of bounds");
            self.drop_packet();
            return;
        }

        // 2. Rate limits.
        let now = Instant::now();
        if !self.check_rate_limits(handle, now).await {
            debug!(handle = %handle, "dropping frame: rate limited");
            self.drop_packet();
            return;
        }

        let bound_peer = self.directory.lock().await.handle_to_peer.get(&handle).copied();
        let established = match bound_peer {
            Some(peer) => self.sessions.lock().await.is_established(&peer),
            None => false,
        };

        // 3. Decrypt if a session exists.
        let plaintext = if established {
            let peer = bound_peer.expect("established implies bound_peer is Some");
            match self.decrypt_frame(peer, &frame).await {
                Some(pt) => pt,
                None => {
                    warn!(peer = %peer, "dropping frame: decrypt failed, session torn down");
                    self.handshake_progress.lock().await.remove(&peer);
                    self.drop_packet();
                    return;
                }
            }
        } else {
            frame
        };

        // 4. Codec parse: signed form required once a session exists.
        let parsed = if established {
            Packet::decode_signed(&plaintext, &self.codec_config, now_ms())
        } else {
            Packet::decode(&plaintext, &self.codec_config, now_ms())
        };
        let packet = match parsed {
            Ok(packet) => packet,
            Err(err) => {
                debug!(handle = %handle, error = %err, "dropping frame: codec parse error");
                self.drop_packet();
                return;
            }
        };
        if established && packet.signature.is_none() && !packet.msg_type.is_handshake() {
            debug!(handle = %handle, "dropping frame: unsigned packet over established session");
            self.drop_packet();
            return;
        }

        // 5. Handshake routing.
        if packet.msg_type.is_handshake() {
            self.handle_handshake_packet(handle, packet).await;
            return;
        }

        // 6. Source-id binding.
        if established {
            let peer = bound_peer.expect("established implies bound_peer is Some");
            if packet.source_id != peer {
                warn!(handle = %handle, "dropping frame: source_id does not match bound peer");
                self.drop_packet();
                return;
            }
        }

        // 7. Signature verification.
        if packet.signature.is_none() {
            warn!(handle = %handle, "dropping frame: unsigned, unverifiable non-handshake packet");
            self.drop_packet();
            return;
        }
        match self.resolve_verifying_key(bound_peer, &packet).await {
            Some(key) => {
                if verify_packet(&packet, &key).is_err() {
                    warn!(handle = %handle, "dropping frame: signature verification failed");
                    self.drop_packet();
                    return;
                }
            }
            None => {
                warn!(handle = %handle, "dropping frame: no pinned signing key to verify against");
                self.drop_packet();
                return;
            }
        }

        // 8. Dedup.
        let packet_id = packet.packet_id();
        let is_duplicate = self.dedup.lock().await.check_and_insert(&packet_id, now);
        if is_duplicate {
            return;
        }

        // 9. Gossip record, only after full verification.
        self.gossip.lock().await.on_packet_seen(packet_id.clone());

        // 10. Topology/discovery update.
        if matches!(packet.msg_type, MessageType::TopologyAnnounce | MessageType::Discovery) {
            if let Ok(discovery) = DiscoveryPayload::decode(&packet.payload) {
                self.topology
                    .lock()
                    .await
                    .update_neighbors(packet.source_id, discovery.neighbors, now);
            }
        }

        // 11. Deliver to the application.
        if packet.dest_id.is_broadcast() || packet.dest_id == self.local_peer_id {
            self.stats.packets_delivered.fetch_add(1, Ordering::Relaxed);
            let _ = self.events_tx.send(MeshEvent::PacketReceived(packet.clone())).await;
        }

        // 12. Relay Controller decision.
        self.maybe_relay(packet).await;
    }

    async fn decrypt_frame(&self, peer: PeerId, frame: &[u8]) -> Option<Vec<u8>> {
        if frame.len() < 4 {
            return None;
        }
        let mut counter_bytes = [0u8; 4];
        counter_bytes.copy_from_slice(&frame[..4]);
        let counter = u32::from_be_bytes(counter_bytes);
        let ciphertext = &frame[4..];
        self.sessions
            .lock()
            .await
            .decrypt(&peer, counter, b"", ciphertext)
            .ok()
            .flatten()
    }

    /// Find the verifying key to check `packet`'s signature against: the
    /// pinned key for the bound peer on this handle, or failing that (the
    /// multi-hop relay case), the pinned key for `packet.source_id` if it is
    /// already known from a prior direct handshake (§4.11 step 7).
    async fn resolve_verifying_key(&self, bound_peer: Option<PeerId>, packet: &Packet) -> Option<VerifyingKey> {
        let mut sessions = self.sessions.lock().await;
        if let Some(peer) = bound_peer {
            if let Some(bytes) = sessions.pinned_signing_key(&peer) {
                if let Ok(key) = VerifyingKey::from_bytes(&bytes) {
                    return Some(key);
                }
            }
        }
        let bytes = sessions.pinned_signing_key(&packet.source_id)?;
        VerifyingKey::from_bytes(&bytes).ok()
    }

    /// Feed one handshake-message payload into the session manager and, on
    /// success, send the reply wire bytes (if any) back over `handle`.
    async fn handle_handshake_packet(&self, handle: PeerHandle, packet: Packet) {
        let claimed_peer = packet.source_id;
        let already_bound = self.directory.lock().await.handle_to_peer.get(&handle).copied();
        let peer = already_bound.unwrap_or(claimed_peer);
        if already_bound.is_none() {
            self.directory.lock().await.bind(handle, peer);
        }

        let expect = self.handshake_progress.lock().await.get(&peer).copied();
        let outcome = {
            let mut sessions = self.sessions.lock().await;
            match expect {
                None => sessions.accept_handshake_init(peer, &packet.payload).map(Some),
                Some(HandshakeExpect::AwaitingMsg2) => {
                    sessions.accept_handshake_response(peer, &packet.payload).map(Some)
                }
                Some(HandshakeExpect::AwaitingMsg3) => {
                    sessions.accept_handshake_final(peer, &packet.payload).map(|_| None)
                }
            }
        };

        let reply = match outcome {
            Ok(reply) => reply,
            Err(SessionError::KeyMismatch) => {
                warn!(handle = %handle, peer = %peer, "pinned signing key mismatch on handshake");
                self.directory.lock().await.unbind_handle(handle);
                self.handshake_progress.lock().await.remove(&peer);
                let _ = self.events_tx.send(MeshEvent::SigningKeyChanged(peer)).await;
                self.drop_packet();
                return;
            }
            Err(err) => {
                warn!(handle = %handle, peer = %peer, error = %err, "handshake step failed");
                self.directory.lock().await.unbind_handle(handle);
                self.handshake_progress.lock().await.remove(&peer);
                self.drop_packet();
                return;
            }
        };

        match expect {
            None => {
                self.handshake_progress
                    .lock()
                    .await
                    .insert(peer, HandshakeExpect::AwaitingMsg3);
            }
            Some(_) => {
                self.handshake_progress.lock().await.remove(&peer);
            }
        }

        if self.sessions.lock().await.is_established(&peer) {
            self.stats.peers_authenticated.fetch_add(1, Ordering::Relaxed);
            let _ = self.events_tx.send(MeshEvent::PeerAuthenticated(peer)).await;
        }

        if let Some(reply_bytes) = reply {
            let Ok(reply_packet) = Packet::new(
                MessageType::Handshake,
                1,
                0,
                now_ms(),
                self.local_peer_id,
                peer,
                reply_bytes,
            ) else {
                self.drop_packet();
                return;
            };
            if self
                .transport
                .send_to(handle, reply_packet.encode(), true)
                .await
                .is_err()
            {
                warn!(handle = %handle, "handshake reply send failed");
            }
        }
    }

    async fn maybe_relay(&self, mut packet: Packet) {
        let degree = self.topology.lock().await.peer_count();
        let decision = self
            .relay
            .decide(packet.ttl, packet.msg_type.is_handshake(), degree);
        let (ttl, delay_ms) = match decision {
            RelayDecision::Drop => return,
            RelayDecision::Schedule { ttl, delay_ms } => (ttl, delay_ms),
        };
        packet.ttl = ttl;

        let packet_id = packet.packet_id();
        let hits_at_schedule = self.dedup.lock().await.hit_count(&packet_id).unwrap_or(0);

        let transport = Arc::clone(&self.transport);
        let running = Arc::clone(&self.running);
        let dedup = Arc::clone(&self.dedup);
        let bytes = packet.encode();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if !running.load(Ordering::SeqCst) {
                return;
            }
            // Re-check immediately before broadcasting: if another path
            // delivered this id again while we were waiting out jitter,
            // someone else already relayed it, so stand down (§4.10).
            let hits_now = dedup.lock().await.hit_count(&packet_id).unwrap_or(0);
            if hits_now != hits_at_schedule {
                return;
            }
            let _ = transport.broadcast(bytes).await;
        });
        self.stats.packets_relayed.fetch_add(1, Ordering::Relaxed);
    }

    /// Sign with the local identity and emit to every session-authenticated
    /// peer, each re-encrypted through its own send cipher. Peers with no
    /// established session never receive the plaintext (§4.11 outbound).
    pub async fn broadcast(&self, mut packet: Packet) -> crate::Result<()> {
        packet.source_id = self.local_peer_id;
        packet.timestamp_ms = now_ms();
        let signed = sign_packet(&packet, &self.local_signing);
        let plaintext = signed.encode();

        let peers: Vec<(PeerId, PeerHandle)> = {
            let directory = self.directory.lock().await;
            directory.peer_to_handle.iter().map(|(p, h)| (*p, *h)).collect()
        };

        for (peer, handle) in peers {
            let established = self.sessions.lock().await.is_established(&peer);
            if !established {
                continue;
            }
            let Some(frame) = self.encrypt_for_peer(peer, &plaintext).await else {
                continue;
            };
            let _ = self.transport.send_to(handle, frame, false).await;
        }
        Ok(())
    }

    /// `send(packet, peer_id)`: requires an authenticated session. If
    /// missing, or the session needs rekeying, a fresh handshake is
    /// scheduled instead of ever transmitting plaintext.
    pub async fn send(&self, mut packet: Packet, peer: PeerId) -> crate::Result<()> {
        packet.source_id = self.local_peer_id;
        packet.dest_id = peer;
        packet.timestamp_ms = now_ms();
        let signed = sign_packet(&packet, &self.local_signing);
        let plaintext = signed.encode();

        let handle = self.directory.lock().await.peer_to_handle.get(&peer).copied();
        let Some(handle) = handle else {
            self.schedule_rehandshake(peer).await;
            return Err(crate::MeshError::NoSession);
        };

        match self.encrypt_for_peer(peer, &plaintext).await {
            Some(frame) => self
                .transport
                .send_to(handle, frame, true)
                .await
                .map_err(|_| crate::MeshError::Transport("send failed".into())),
            None => {
                self.schedule_rehandshake(peer).await;
                Err(crate::MeshError::RekeyNeeded)
            }
        }
    }

    async fn encrypt_for_peer(&self, peer: PeerId, plaintext: &[u8]) -> Option<Vec<u8>> {
        let mut sessions = self.sessions.lock().await;
        let (counter, ciphertext) = sessions.encrypt(&peer, b"", plaintext).ok().flatten()?;
        let mut frame = Vec::with_capacity(4 + ciphertext.len());
        frame.extend_from_slice(&counter.to_be_bytes());
        frame.extend_from_slice(&ciphertext);
        Some(frame)
    }

    async fn schedule_rehandshake(&self, peer: PeerId) {
        self.sessions.lock().await.remove_session(&peer);
        self.handshake_progress.lock().await.remove(&peer);
        let handle = self.directory.lock().await.peer_to_handle.get(&peer).copied();
        let Some(handle) = handle else { return };
        let msg1 = match self.sessions.lock().await.initiate_handshake(peer) {
            Ok(bytes) => bytes,
            Err(_) => return,
        };
        self.handshake_progress
            .lock()
            .await
            .insert(peer, HandshakeExpect::AwaitingMsg2);
        let Ok(packet) = Packet::new(MessageType::Handshake, 1, 0, now_ms(), self.local_peer_id, peer, msg1) else {
            return;
        };
        let _ = self.transport.send_to(handle, packet.encode(), true).await;
    }
}
