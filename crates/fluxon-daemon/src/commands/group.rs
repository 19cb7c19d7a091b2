//! Group command handlers (§4.5/C5): create or join a group from a
//! passphrase, persisting the resulting descriptor at rest.

use fluxon_group::descriptor::{create_group, join_group};
use fluxon_group::join_code::{decode_join_code, encode_join_code};
use fluxon_storage::queries::group as group_queries;
use serde_json::Value;

use super::{CommandError, CommandResult};
use crate::DaemonState;

fn get_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, CommandError> {
    params
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| CommandError::invalid_params(format!("missing or non-string field '{field}'")))
}

fn get_members(params: &Value) -> Vec<String> {
    params
        .get("members")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

/// Create a new group from a passphrase, returning its join code.
pub async fn create(state: &DaemonState, params: &Value) -> CommandResult {
    let passphrase = get_str(params, "passphrase")?;
    let name = get_str(params, "name")?;
    let members = get_members(params);

    let descriptor =
        create_group(passphrase.as_bytes()).map_err(|e| CommandError::internal(e.to_string()))?;
    let join_code = encode_join_code(&descriptor.salt);

    let storage = state.storage.lock().await;
    group_queries::save(&storage, &state.file_key, &descriptor, name, &members)
        .map_err(|e| CommandError::internal(e.to_string()))?;

    Ok(serde_json::json!({
        "group_id": descriptor.group_id.to_string(),
        "join_code": join_code,
    }))
}

/// Join an existing group given its passphrase and join code.
pub async fn join(state: &DaemonState, params: &Value) -> CommandResult {
    let passphrase = get_str(params, "passphrase")?;
    let join_code = get_str(params, "join_code")?;
    let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("unnamed group");
    let members = get_members(params);

    let salt = decode_join_code(join_code).map_err(|_| CommandError::invalid_params("invalid join code"))?;
    let descriptor =
        join_group(passphrase.as_bytes(), salt).map_err(|e| CommandError::internal(e.to_string()))?;

    let storage = state.storage.lock().await;
    group_queries::save(&storage, &state.file_key, &descriptor, name, &members)
        .map_err(|e| CommandError::internal(e.to_string()))?;

    Ok(serde_json::json!({ "group_id": descriptor.group_id.to_string() }))
}

/// Leave the active group, deleting its persisted key material.
pub async fn leave(state: &DaemonState, _params: &Value) -> CommandResult {
    let storage = state.storage.lock().await;
    group_queries::clear(&storage).map_err(|e| CommandError::internal(e.to_string()))?;
    Ok(serde_json::json!({ "left": true }))
}
