//! [`MeshEvent`]: the application-facing event stream. Generalizes the
//! `on_packet_received` / `on_peers_changed` surface into one typed
//! broadcast stream, in the same shape as `fluxon_daemon::events::EventBus`
//! uses for its own JSON event fan-out.

use fluxon_codec::packet::Packet;
use fluxon_types::PeerId;

/// One event the Mesh Service may emit to the application.
///
/// Only fully verified, post-pipeline events are emitted here — parse,
/// auth, and rate-limit failures are never surfaced as events (§7), to
/// avoid giving an attacker a feedback oracle for what was dropped.
#[derive(Clone, Debug)]
pub enum MeshEvent {
    /// A fully verified, deduplicated application packet addressed to us
    /// or to broadcast.
    PacketReceived(Packet),

    /// A peer's session finished the handshake and is now authenticated.
    PeerAuthenticated(PeerId),

    /// A previously authenticated peer's session was removed (disconnect,
    /// decrypt failure, or LRU eviction).
    PeerLost(PeerId),

    /// TOFU detected a signing-key change for a previously pinned peer;
    /// the handshake was rejected and no session was established.
    SigningKeyChanged(PeerId),
}
