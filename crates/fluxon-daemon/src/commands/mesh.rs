//! Mesh Service command handlers (§4.11/C11): `start`, `stop`,
//! `broadcast`, `send`, and a minimal statistics surface.

use fluxon_codec::packet::{MessageType, Packet};
use fluxon_codec::payload::ChatPayload;
use fluxon_types::PeerId;
use serde_json::Value;

use super::{CommandError, CommandResult};
use crate::DaemonState;

pub async fn start(state: &DaemonState, _params: &Value) -> CommandResult {
    state.mesh.start().await.map_err(|e| CommandError::internal(e.to_string()))?;
    Ok(serde_json::json!({ "started": true }))
}

pub async fn stop(state: &DaemonState, _params: &Value) -> CommandResult {
    state.mesh.stop().await.map_err(|e| CommandError::internal(e.to_string()))?;
    Ok(serde_json::json!({ "stopped": true }))
}

pub async fn status(state: &DaemonState, _params: &Value) -> CommandResult {
    let stats = state.mesh.stats();
    Ok(serde_json::json!({
        "peer_id": state.mesh.local_peer_id().to_string(),
        "packets_received": stats.packets_received,
        "packets_delivered": stats.packets_delivered,
        "packets_relayed": stats.packets_relayed,
        "packets_dropped": stats.packets_dropped,
        "peers_authenticated": stats.peers_authenticated,
    }))
}

fn chat_payload(params: &Value) -> Result<Vec<u8>, CommandError> {
    let text = params
        .get("text")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CommandError::invalid_params("missing field 'text'"))?
        .to_string();
    let name = params.get("name").and_then(|v| v.as_str()).map(String::from);

    ChatPayload { text, name }
        .encode()
        .map_err(|e| CommandError::invalid_params(e.to_string()))
}

/// Sign and emit a chat message to every session-authenticated peer.
pub async fn broadcast(state: &DaemonState, params: &Value) -> CommandResult {
    let payload = chat_payload(params)?;
    let packet = Packet::new(MessageType::Chat, 7, 0, 0, PeerId::BROADCAST, PeerId::BROADCAST, payload)
        .map_err(|e| CommandError::invalid_params(e.to_string()))?;

    state.mesh.broadcast(packet).await.map_err(|e| CommandError::internal(e.to_string()))?;
    Ok(serde_json::json!({ "sent": true }))
}

/// Sign and send a chat message to one authenticated peer.
pub async fn send(state: &DaemonState, params: &Value) -> CommandResult {
    let peer_hex = params
        .get("peer_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CommandError::invalid_params("missing field 'peer_id'"))?;
    let peer_bytes = hex::decode(peer_hex).map_err(|_| CommandError::invalid_params("peer_id is not valid hex"))?;
    let peer_arr: [u8; 32] = peer_bytes
        .try_into()
        .map_err(|_| CommandError::invalid_params("peer_id must be 32 bytes"))?;
    let peer = PeerId::from_bytes(peer_arr);

    let payload = chat_payload(params)?;
    let packet = Packet::new(MessageType::Chat, 7, 0, 0, PeerId::BROADCAST, peer, payload)
        .map_err(|e| CommandError::invalid_params(e.to_string()))?;

    state.mesh.send(packet, peer).await.map_err(|e| CommandError::internal(e.to_string()))?;
    Ok(serde_json::json!({ "sent": true }))
}
