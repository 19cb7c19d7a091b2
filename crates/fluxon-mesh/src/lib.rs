//! # fluxon-mesh
//!
//! The flood-routed mesh relay layer: deduplication, topology tracking,
//! gossip sync, relay scheduling, the transport adapter contract, and the
//! [`service::MeshService`] orchestrator that ties them together with the
//! codec and session layers.
//!
//! ## Architecture
//!
//! ```text
//! Transport (transport.rs)       -- untrusted byte-stream adapter contract
//!     |
//!     v
//! MeshService (service.rs)       -- inbound pipeline, outbound send/broadcast
//!     |        \
//!     |         +--> SessionManager (fluxon-session)
//!     |         +--> Packet/Payload (fluxon-codec)
//!     v
//! Dedup (dedup.rs) -- Topology (topology.rs) -- Gossip (gossip.rs) -- Relay (relay.rs)
//! ```
//!
//! ## Modules
//!
//! - [`dedup`] — [`dedup::Deduplicator`], the bounded packet-id admission set (C7)
//! - [`topology`] — [`topology::TopologyTracker`], claimed-neighbor graph and route cache (C8)
//! - [`gossip`] — [`gossip::GossipSync`], bounded seen-id set and sync-request budget (C9)
//! - [`relay`] — [`relay::RelayController`], jittered rebroadcast scheduling (C10)
//! - [`transport`] — [`transport::Transport`], the narrow untrusted-byte-stream contract (C12)
//! - [`events`] — [`events::MeshEvent`], the application-facing event stream
//! - [`service`] — [`service::MeshService`], the orchestrator (C11)

pub mod dedup;
pub mod events;
pub mod gossip;
pub mod relay;
pub mod service;
pub mod topology;
pub mod transport;

pub use dedup::Deduplicator;
pub use events::MeshEvent;
pub use gossip::GossipSync;
pub use relay::RelayController;
pub use service::{MeshService, MeshStats};
pub use topology::TopologyTracker;
pub use transport::{PeerHandle, Transport, TransportEvent};

/// Error types for mesh-layer operations.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    /// A frame was empty or exceeded the 4096-byte inbound length bound.
    #[error("frame length out of bounds")]
    FrameLengthOutOfBounds,

    /// Global or per-handle inbound rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// No session exists for this peer and one is required for the
    /// requested operation.
    #[error("no session with peer")]
    NoSession,

    /// `encrypt` returned `None`: the session is due for rekey and was torn
    /// down as a side effect. The caller must re-handshake.
    #[error("session rekey needed")]
    RekeyNeeded,

    /// The underlying transport failed to deliver the frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// Wire codec error while parsing or constructing a packet.
    #[error("codec error: {0}")]
    Codec(#[from] fluxon_codec::CodecError),

    /// Session-layer error (handshake, rate limit, rekey, signing-key
    /// mismatch).
    #[error("session error: {0}")]
    Session(#[from] fluxon_session::SessionError),
}

pub type Result<T> = std::result::Result<T, MeshError>;

/// Maximum inbound frame length accepted at the Mesh Service entry point
/// (§4.11 step 1), before any parsing is attempted.
pub const MAX_INBOUND_FRAME_LEN: usize = 4096;
