//! Identity command handlers.

use serde_json::Value;

use super::CommandResult;
use crate::DaemonState;

/// Report this node's PeerId, derived from its X25519 static public key.
pub async fn show(state: &DaemonState, _params: &Value) -> CommandResult {
    Ok(serde_json::json!({
        "peer_id": state.mesh.local_peer_id().to_string(),
    }))
}
