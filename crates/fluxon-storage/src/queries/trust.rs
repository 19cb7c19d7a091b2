//! At-rest mirror of the in-memory TOFU trust store (§4.3/C3): the signing
//! key pinned to each [`fluxon_types::PeerId`] the node has ever completed a
//! handshake with. Signing keys are not secret and are stored unsealed.

use std::time::{SystemTime, UNIX_EPOCH};

use fluxon_types::PeerId;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{Result, StorageError};

/// Pin (or re-pin) a peer's signing key.
pub fn pin(conn: &Connection, peer_id: &PeerId, signing_public_key: &[u8; 32]) -> Result<()> {
    let pinned_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    conn.execute(
        "INSERT OR REPLACE INTO trust_store (peer_id, signing_public_key, pinned_at)
         VALUES (?1, ?2, ?3)",
        params![peer_id.as_bytes().as_slice(), signing_public_key.as_slice(), pinned_at],
    )?;
    Ok(())
}

/// Look up the pinned signing key for a peer, if any.
pub fn get(conn: &Connection, peer_id: &PeerId) -> Result<Option<[u8; 32]>> {
    let row: Option<Vec<u8>> = conn
        .query_row(
            "SELECT signing_public_key FROM trust_store WHERE peer_id = ?1",
            params![peer_id.as_bytes().as_slice()],
            |row| row.get(0),
        )
        .optional()?;

    match row {
        Some(bytes) => {
            let key: [u8; 32] = bytes
                .try_into()
                .map_err(|_| StorageError::Malformed("pinned signing key length".into()))?;
            Ok(Some(key))
        }
        None => Ok(None),
    }
}

/// Forget a pinned peer, e.g. on explicit re-trust after a signing key
/// change the user has confirmed out of band.
pub fn forget(conn: &Connection, peer_id: &PeerId) -> Result<()> {
    conn.execute(
        "DELETE FROM trust_store WHERE peer_id = ?1",
        params![peer_id.as_bytes().as_slice()],
    )?;
    Ok(())
}

/// Load every pinned peer, for warming the in-memory trust store on daemon
/// startup.
pub fn load_all(conn: &Connection) -> Result<Vec<(PeerId, [u8; 32])>> {
    let mut stmt = conn.prepare("SELECT peer_id, signing_public_key FROM trust_store")?;
    let rows = stmt.query_map([], |row| {
        let peer_id_bytes: Vec<u8> = row.get(0)?;
        let signing_key_bytes: Vec<u8> = row.get(1)?;
        Ok((peer_id_bytes, signing_key_bytes))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (peer_id_bytes, signing_key_bytes) = row?;
        let peer_id_arr: [u8; 32] = peer_id_bytes
            .try_into()
            .map_err(|_| StorageError::Malformed("peer id length".into()))?;
        let signing_key_arr: [u8; 32] = signing_key_bytes
            .try_into()
            .map_err(|_| StorageError::Malformed("signing key length".into()))?;
        out.push((PeerId::from_bytes(peer_id_arr), signing_key_arr));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_get_missing_returns_none() {
        let conn = test_db();
        let peer_id = PeerId::from_bytes([1u8; 32]);
        assert!(get(&conn, &peer_id).expect("get").is_none());
    }

    #[test]
    fn test_pin_and_get() {
        let conn = test_db();
        let peer_id = PeerId::from_bytes([2u8; 32]);
        let key = [3u8; 32];
        pin(&conn, &peer_id, &key).expect("pin");
        let loaded = get(&conn, &peer_id).expect("get").expect("some key");
        assert_eq!(loaded, key);
    }

    #[test]
    fn test_repin_overwrites() {
        let conn = test_db();
        let peer_id = PeerId::from_bytes([4u8; 32]);
        pin(&conn, &peer_id, &[5u8; 32]).expect("pin first");
        pin(&conn, &peer_id, &[6u8; 32]).expect("pin second");
        let loaded = get(&conn, &peer_id).expect("get").expect("some key");
        assert_eq!(loaded, [6u8; 32]);
    }

    #[test]
    fn test_forget() {
        let conn = test_db();
        let peer_id = PeerId::from_bytes([7u8; 32]);
        pin(&conn, &peer_id, &[8u8; 32]).expect("pin");
        forget(&conn, &peer_id).expect("forget");
        assert!(get(&conn, &peer_id).expect("get").is_none());
    }

    #[test]
    fn test_load_all() {
        let conn = test_db();
        let peer_a = PeerId::from_bytes([10u8; 32]);
        let peer_b = PeerId::from_bytes([11u8; 32]);
        pin(&conn, &peer_a, &[20u8; 32]).expect("pin a");
        pin(&conn, &peer_b, &[21u8; 32]).expect("pin b");

        let all = load_all(&conn).expect("load_all");
        assert_eq!(all.len(), 2);
    }
}
