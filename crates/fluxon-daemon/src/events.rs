//! The JSON-lines event fan-out (§10.6): wraps the typed
//! [`fluxon_mesh::events::MeshEvent`] broadcast the Mesh Service already
//! exposes and republishes each event as one JSON line per subscriber, with
//! an independent buffer per subscriber exactly as `EventBus` elsewhere in
//! this workspace does it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fluxon_mesh::events::MeshEvent;
use serde::Serialize;
use tokio::sync::broadcast;

/// One JSON-serializable line pushed to every subscriber.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonEvent {
    pub seq: u64,
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Broadcasts [`DaemonEvent`]s to every JSON-lines subscriber.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DaemonEvent>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn emit(&self, event_type: &str, payload: serde_json::Value) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.sender.send(DaemonEvent {
            seq,
            event_type: event_type.to_string(),
            payload,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.sender.subscribe()
    }
}

/// Convert one [`MeshEvent`] into its JSON-lines shape.
pub fn mesh_event_to_json(event: &MeshEvent) -> (&'static str, serde_json::Value) {
    match event {
        MeshEvent::PacketReceived(packet) => (
            "PacketReceived",
            serde_json::json!({
                "source_id": packet.source_id.to_string(),
                "dest_id": packet.dest_id.to_string(),
                "msg_type": packet.msg_type.value(),
                "payload_len": packet.payload.len(),
            }),
        ),
        MeshEvent::PeerAuthenticated(peer) => (
            "PeerAuthenticated",
            serde_json::json!({ "peer_id": peer.to_string() }),
        ),
        MeshEvent::PeerLost(peer) => (
            "PeerLost",
            serde_json::json!({ "peer_id": peer.to_string() }),
        ),
        MeshEvent::SigningKeyChanged(peer) => (
            "SigningKeyChanged",
            serde_json::json!({ "peer_id": peer.to_string() }),
        ),
    }
}
