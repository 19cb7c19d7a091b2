//! fluxon-daemon: a small binary wiring a concrete transport to the Mesh
//! Service (§10.6). Exposes `identity`/`group`/`mesh` commands over a
//! minimal JSON-lines stdin/stdout loop, standing in for the UI/JSON-RPC
//! edge that `spec.md` §1 places out of scope.

mod commands;
mod config;
mod events;
mod transport;

use std::io::Write as _;
use std::sync::Arc;

use fluxon_crypto::ed25519::SigningKey;
use fluxon_crypto::x25519::X25519StaticSecret;
use fluxon_mesh::service::MeshService;
use fluxon_mesh::transport::PeerHandle;
use fluxon_storage::queries::identity as identity_queries;
use fluxon_storage::FileKey;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::transport::InMemoryTransport;

/// Handle used for this process's own, as-yet-unconnected transport slot.
const SELF_HANDLE: PeerHandle = PeerHandle(1);

/// Daemon-wide shared state, passed by reference to every command handler.
pub struct DaemonState {
    pub storage: Mutex<rusqlite::Connection>,
    pub file_key: FileKey,
    pub config: DaemonConfig,
    pub event_bus: EventBus,
    pub mesh: Arc<MeshService<InMemoryTransport>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DaemonConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("fluxon daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let storage = if config.storage.in_memory {
        fluxon_storage::open_memory()?
    } else {
        fluxon_storage::open(&data_dir.join("fluxon.db"))?
    };

    let file_key = resolve_file_key();

    let identity = load_or_create_identity(&storage, &file_key)?;

    let (transport, channels) = transport::standalone_transport(SELF_HANDLE).await;
    let (mesh, mut mesh_events) = MeshService::new(
        identity.static_secret,
        identity.signing_secret,
        transport,
        fluxon_codec::packet::CodecConfig {
            max_ttl: config.mesh.max_ttl,
            ..fluxon_codec::packet::CodecConfig::default()
        },
    );

    info!(peer_id = %mesh.local_peer_id(), "identity ready");

    let event_bus = EventBus::new(1000);
    let event_bus_for_bridge = event_bus.clone();
    tokio::spawn(async move {
        while let Some(event) = mesh_events.recv().await {
            let (event_type, payload) = events::mesh_event_to_json(&event);
            event_bus_for_bridge.emit(event_type, payload);
        }
    });

    let state = Arc::new(DaemonState {
        storage: Mutex::new(storage),
        file_key,
        config,
        event_bus,
        mesh,
    });

    event_bus_announce_started(&state);

    run_command_loop(state, channels).await;

    info!("fluxon daemon stopped");
    Ok(())
}

fn event_bus_announce_started(state: &DaemonState) {
    state.event_bus.emit(
        "DaemonStarted",
        serde_json::json!({ "peer_id": state.mesh.local_peer_id().to_string() }),
    );
}

/// A 32-byte key, hex-encoded in `FLUXON_FILE_KEY`, protecting everything
/// this crate writes at rest. Falls back to an ephemeral random key (with a
/// loud warning) so the daemon is still usable for local exercising without
/// any setup; a real deployment always sets the variable explicitly.
fn resolve_file_key() -> FileKey {
    match std::env::var("FLUXON_FILE_KEY") {
        Ok(hex_str) => match hex::decode(hex_str.trim()) {
            Ok(bytes) if bytes.len() == 32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                FileKey::from_bytes(arr)
            }
            _ => {
                warn!("FLUXON_FILE_KEY is not 32 bytes of hex; using an ephemeral key instead");
                random_file_key()
            }
        },
        Err(_) => {
            warn!("FLUXON_FILE_KEY not set; using an ephemeral file key for this run only");
            random_file_key()
        }
    }
}

fn random_file_key() -> FileKey {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    FileKey::from_bytes(bytes)
}

fn load_or_create_identity(
    conn: &rusqlite::Connection,
    file_key: &FileKey,
) -> anyhow::Result<identity_queries::Identity> {
    if let Some(stored) = identity_queries::load(conn, file_key)? {
        info!("loaded existing identity from storage");
        return Ok(stored);
    }

    info!("no stored identity found; generating a new one");
    let identity = identity_queries::Identity {
        static_secret: X25519StaticSecret::random(),
        signing_secret: SigningKey::generate(),
    };
    identity_queries::store(conn, file_key, &identity)?;
    Ok(identity)
}

/// Read one JSON command per line from stdin, dispatch it, and write one
/// JSON response per line to stdout. Exits on EOF or the `shutdown` command.
async fn run_command_loop(state: Arc<DaemonState>, channels: fluxon_mesh::transport::TransportChannels) {
    let mesh_for_run = state.mesh.clone();
    let run_handle = tokio::spawn(async move {
        mesh_for_run.run(channels).await;
    });

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let stdout = std::io::stdout();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin read error: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let (response, shutdown_requested) = commands::dispatch(&state, &line).await;
        let mut out = stdout.lock();
        if writeln!(out, "{response}").is_err() {
            break;
        }
        drop(out);

        if shutdown_requested {
            break;
        }
    }

    let _ = state.mesh.stop().await;
    run_handle.abort();
}
