//! A concrete in-memory [`fluxon_mesh::Transport`] implementation (§10.6),
//! standing in for the UI/network edge this crate deliberately excludes.
//! [`paired_transports`] wires two transports together over plain
//! `tokio::sync::mpsc` channels — enough to drive the full Noise handshake
//! and packet pipeline end to end within one process, for local exercising
//! and the integration tests.

use fluxon_mesh::transport::{PeerHandle, Transport, TransportChannels, TransportEvent};
use tokio::sync::mpsc;

/// One side of a point-to-point in-memory link. `peer_handle` is the
/// opaque handle this side uses to address the other end; it is the only
/// handle [`InMemoryTransport::send_to`] accepts.
pub struct InMemoryTransport {
    peer_handle: PeerHandle,
    outbound: mpsc::Sender<Vec<u8>>,
    frames_tx: mpsc::Sender<(PeerHandle, Vec<u8>)>,
    events_tx: mpsc::Sender<TransportEvent>,
}

/// Build two linked [`InMemoryTransport`]s: `a` addresses `b` as
/// `handle_b`, and vice versa. Both sides start with a
/// [`TransportEvent::Connected`] already queued, since an in-memory link
/// has no separate connection-establishment phase.
pub async fn paired_transports(
    handle_a: PeerHandle,
    handle_b: PeerHandle,
) -> ((InMemoryTransport, TransportChannels), (InMemoryTransport, TransportChannels)) {
    let (a_to_b, b_from_a) = mpsc::channel::<Vec<u8>>(256);
    let (b_to_a, a_from_b) = mpsc::channel::<Vec<u8>>(256);

    let (a_frames_tx, a_frames_rx) = mpsc::channel(256);
    let (a_events_tx, a_events_rx) = mpsc::channel(8);
    let (b_frames_tx, b_frames_rx) = mpsc::channel(256);
    let (b_events_tx, b_events_rx) = mpsc::channel(8);

    let transport_a = InMemoryTransport {
        peer_handle: handle_b,
        outbound: a_to_b,
        frames_tx: a_frames_tx,
        events_tx: a_events_tx.clone(),
    };
    let transport_b = InMemoryTransport {
        peer_handle: handle_a,
        outbound: b_to_a,
        frames_tx: b_frames_tx,
        events_tx: b_events_tx.clone(),
    };

    tokio::spawn(forward(a_from_b, transport_a.frames_tx.clone(), handle_b));
    tokio::spawn(forward(b_from_a, transport_b.frames_tx.clone(), handle_a));

    let _ = a_events_tx.send(TransportEvent::Connected(handle_b)).await;
    let _ = b_events_tx.send(TransportEvent::Connected(handle_a)).await;

    (
        (transport_a, TransportChannels { frames: a_frames_rx, events: a_events_rx }),
        (transport_b, TransportChannels { frames: b_frames_rx, events: b_events_rx }),
    )
}

async fn forward(mut rx: mpsc::Receiver<Vec<u8>>, frames_tx: mpsc::Sender<(PeerHandle, Vec<u8>)>, from: PeerHandle) {
    while let Some(bytes) = rx.recv().await {
        if frames_tx.send((from, bytes)).await.is_err() {
            break;
        }
    }
}

impl InMemoryTransport {
    pub fn peer_handle(&self) -> PeerHandle {
        self.peer_handle
    }
}

/// A transport with no peer wired up yet: `send_to`/`broadcast` to
/// `self_handle` succeed into a sink that discards the bytes, and the frame
/// and event streams stay pending forever. Used when a daemon starts before
/// it has anyone to talk to.
pub async fn standalone_transport(self_handle: PeerHandle) -> (InMemoryTransport, TransportChannels) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(16);
    tokio::spawn(async move { while outbound_rx.recv().await.is_some() {} });

    let (frames_tx, frames_rx) = mpsc::channel(16);
    let (events_tx, events_rx) = mpsc::channel(8);

    let transport = InMemoryTransport {
        peer_handle: self_handle,
        outbound: outbound_tx,
        frames_tx,
        events_tx,
    };
    (transport, TransportChannels { frames: frames_rx, events: events_rx })
}

impl Transport for InMemoryTransport {
    async fn start(&self) -> fluxon_mesh::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> fluxon_mesh::Result<()> {
        Ok(())
    }

    async fn send_to(&self, handle: PeerHandle, bytes: Vec<u8>, _reliable_hint: bool) -> fluxon_mesh::Result<()> {
        if handle != self.peer_handle {
            return Err(fluxon_mesh::MeshError::Transport("unknown handle".into()));
        }
        self.outbound
            .send(bytes)
            .await
            .map_err(|_| fluxon_mesh::MeshError::Transport("peer link closed".into()))
    }

    async fn broadcast(&self, bytes: Vec<u8>) -> fluxon_mesh::Result<()> {
        self.send_to(self.peer_handle, bytes, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_paired_transports_deliver_frames() {
        let ((transport_a, _channels_a), (_transport_b, mut channels_b)) =
            paired_transports(PeerHandle(1), PeerHandle(2)).await;

        transport_a.send_to(PeerHandle(2), b"hello".to_vec(), false).await.expect("send");

        let (from, bytes) = channels_b.frames.recv().await.expect("frame");
        assert_eq!(from, PeerHandle(1));
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn test_send_to_wrong_handle_errors() {
        let ((transport_a, _channels_a), (_transport_b, _channels_b)) =
            paired_transports(PeerHandle(1), PeerHandle(2)).await;
        let result = transport_a.send_to(PeerHandle(99), b"x".to_vec(), false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connected_event_queued_on_both_sides() {
        let ((_transport_a, mut channels_a), (_transport_b, mut channels_b)) =
            paired_transports(PeerHandle(1), PeerHandle(2)).await;
        assert_eq!(channels_a.events.recv().await, Some(TransportEvent::Connected(PeerHandle(2))));
        assert_eq!(channels_b.events.recv().await, Some(TransportEvent::Connected(PeerHandle(1))));
    }

    #[tokio::test]
    async fn test_standalone_transport_sinks_outbound_bytes() {
        let (transport, _channels) = standalone_transport(PeerHandle(1)).await;
        transport.send_to(PeerHandle(1), b"nobody home".to_vec(), false).await.expect("send into sink");
    }
}
