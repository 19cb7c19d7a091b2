//! JSON-lines command dispatch (§10.6). Each submodule implements the
//! commands for one area of the daemon's surface; this module only parses
//! the envelope and routes by `cmd`.

pub mod group;
pub mod identity;
pub mod mesh;

use serde::Deserialize;
use serde_json::Value;

use crate::DaemonState;

/// A command error, shaped like the minimal subset of JSON-RPC's error
/// object this daemon actually needs.
#[derive(Debug)]
pub struct CommandError {
    pub code: &'static str,
    pub message: String,
}

impl CommandError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self { code: "INVALID_PARAMS", message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { code: "INTERNAL_ERROR", message: message.into() }
    }
}

pub type CommandResult = std::result::Result<Value, CommandError>;

#[derive(Debug, Deserialize)]
struct CommandEnvelope {
    id: Option<Value>,
    cmd: String,
    #[serde(default)]
    params: Value,
}

/// Parse and route one JSON-lines request, returning the rendered response
/// line and whether the caller asked to shut the daemon down.
pub async fn dispatch(state: &DaemonState, line: &str) -> (String, bool) {
    let envelope: CommandEnvelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => return (render(None, Err(CommandError::invalid_params(e.to_string()))), false),
    };

    let shutdown_requested = envelope.cmd == "shutdown";
    let result = route(state, &envelope.cmd, &envelope.params).await;
    (render(envelope.id, result), shutdown_requested)
}

async fn route(state: &DaemonState, cmd: &str, params: &Value) -> CommandResult {
    match cmd {
        "identity.show" => identity::show(state, params).await,
        "group.create" => group::create(state, params).await,
        "group.join" => group::join(state, params).await,
        "group.leave" => group::leave(state, params).await,
        "mesh.start" => mesh::start(state, params).await,
        "mesh.stop" => mesh::stop(state, params).await,
        "mesh.status" => mesh::status(state, params).await,
        "mesh.broadcast" => mesh::broadcast(state, params).await,
        "mesh.send" => mesh::send(state, params).await,
        "shutdown" => Ok(serde_json::json!({ "ok": true })),
        other => Err(CommandError { code: "METHOD_NOT_FOUND", message: format!("unknown command: {other}") }),
    }
}

fn render(id: Option<Value>, result: CommandResult) -> String {
    let body = match result {
        Ok(value) => serde_json::json!({ "id": id, "ok": true, "result": value }),
        Err(e) => serde_json::json!({ "id": id, "ok": false, "error": { "code": e.code, "message": e.message } }),
    };
    serde_json::to_string(&body).unwrap_or_else(|_| r#"{"ok":false,"error":{"code":"INTERNAL_ERROR","message":"response serialization failed"}}"#.to_string())
}
