//! [`Transport`]: the narrow, untrusted byte-stream contract the Mesh
//! Service is built against (§4.12, §6). Framing, connection management,
//! and MTU are the transport's problem; everything above the raw bytes —
//! parsing, authentication, encryption, routing — is the core's.

use std::fmt;

use tokio::sync::mpsc;

/// Opaque handle identifying one connected peer at the transport layer.
/// Carries no authentication meaning by itself — it is bound to a
/// [`fluxon_types::PeerId`] only after a session authenticates over it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerHandle(pub u64);

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle:{}", self.0)
    }
}

/// A connection lifecycle event surfaced by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(PeerHandle),
    Disconnected(PeerHandle),
}

/// The minimal interface the Mesh Service needs from a concrete transport.
/// No method here authenticates or encrypts anything: a transport is
/// entirely untrusted, by design (§6).
///
/// Implementors return `impl Future` directly (no boxing, no `async-trait`
/// crate) rather than declaring `async fn` in the trait; `MeshService` is
/// generic over `T: Transport` and so never needs a `dyn Transport` object.
pub trait Transport: Send + Sync {
    /// Begin accepting connections / polling the underlying medium.
    fn start(&self) -> impl std::future::Future<Output = crate::Result<()>> + Send;

    /// Stop the transport; in-flight sends may be abandoned.
    fn stop(&self) -> impl std::future::Future<Output = crate::Result<()>> + Send;

    /// Best-effort unicast to `handle`. `reliable_hint` suggests (but does
    /// not guarantee) at-least-once delivery for handshake/emergency
    /// traffic; transports that cannot honor it may ignore it.
    fn send_to(
        &self,
        handle: PeerHandle,
        bytes: Vec<u8>,
        reliable_hint: bool,
    ) -> impl std::future::Future<Output = crate::Result<()>> + Send;

    /// Multicast-ish send; implementations may iterate direct peers.
    fn broadcast(&self, bytes: Vec<u8>) -> impl std::future::Future<Output = crate::Result<()>> + Send;
}

/// A fresh owned inbound frame paired with the handle it arrived on.
pub type IncomingFrame = (PeerHandle, Vec<u8>);

/// Channel-backed handle pair returned by an in-memory transport
/// implementation so the Mesh Service can drive `incoming_frames()` and
/// `peer_events()` as plain `tokio::sync::mpsc` receivers rather than a
/// boxed stream trait object.
pub struct TransportChannels {
    pub frames: mpsc::Receiver<IncomingFrame>,
    pub events: mpsc::Receiver<TransportEvent>,
}
