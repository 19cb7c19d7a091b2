//! The single active group a node belongs to at a time (§1, §5.2): the
//! derived [`fluxon_group::GroupDescriptor`] key material sealed at rest,
//! plus the human-facing name and member list the descriptor itself doesn't
//! carry. Only one row ever exists (`id = 1`); creating or joining a new
//! group replaces it.

use std::time::{SystemTime, UNIX_EPOCH};

use fluxon_group::descriptor::GroupDescriptor;
use fluxon_types::GroupId;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{FileKey, Result, StorageError};

const AAD: &[u8] = b"fluxon-storage/active-group/v1";

/// A loaded group record: the descriptor's derived key material plus the
/// application-facing name and member list.
pub struct ActiveGroup {
    pub group_id: GroupId,
    pub group_key: [u8; 32],
    pub salt: [u8; 16],
    pub name: String,
    pub members: Vec<String>,
}

/// Save the active group, replacing any previously active one.
pub fn save(
    conn: &Connection,
    file_key: &FileKey,
    descriptor: &GroupDescriptor,
    name: &str,
    members: &[String],
) -> Result<()> {
    let group_key_sealed = fluxon_crypto::xchacha20::seal(file_key.as_bytes(), descriptor.group_key(), AAD)?;
    let members_json =
        serde_json::to_string(members).map_err(|e| StorageError::Malformed(e.to_string()))?;
    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    conn.execute(
        "INSERT OR REPLACE INTO active_group
            (id, group_id, group_key_sealed, salt, name, members_json, created_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            descriptor.group_id.as_bytes().as_slice(),
            group_key_sealed,
            descriptor.salt.as_slice(),
            name,
            members_json,
            created_at,
        ],
    )?;

    Ok(())
}

/// Load the active group, if one is set.
pub fn load(conn: &Connection, file_key: &FileKey) -> Result<Option<ActiveGroup>> {
    let row: Option<(Vec<u8>, Vec<u8>, Vec<u8>, String, String)> = conn
        .query_row(
            "SELECT group_id, group_key_sealed, salt, name, members_json FROM active_group WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )
        .optional()?;

    let Some((group_id_bytes, group_key_sealed, salt_bytes, name, members_json)) = row else {
        return Ok(None);
    };

    let group_id_arr: [u8; 16] = group_id_bytes
        .try_into()
        .map_err(|_| StorageError::Malformed("group id length".into()))?;
    let salt_arr: [u8; 16] = salt_bytes
        .try_into()
        .map_err(|_| StorageError::Malformed("salt length".into()))?;

    let group_key_bytes = fluxon_crypto::xchacha20::open(file_key.as_bytes(), &group_key_sealed, AAD)
        .map_err(|_| StorageError::DecryptionFailed)?;
    let group_key: [u8; 32] = group_key_bytes
        .try_into()
        .map_err(|_| StorageError::Malformed("group key length".into()))?;

    let members: Vec<String> =
        serde_json::from_str(&members_json).map_err(|e| StorageError::Malformed(e.to_string()))?;

    Ok(Some(ActiveGroup {
        group_id: GroupId::from_bytes(group_id_arr),
        group_key,
        salt: salt_arr,
        name,
        members,
    }))
}

/// Leave the active group. The sealed group key row is deleted outright;
/// nothing short-lived is left for a future owner of the device to recover.
pub fn clear(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM active_group WHERE id = 1", [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxon_group::descriptor::create_group;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_load_missing_returns_none() {
        let conn = test_db();
        let file_key = FileKey::from_bytes([1u8; 32]);
        assert!(load(&conn, &file_key).expect("load").is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let conn = test_db();
        let file_key = FileKey::from_bytes([2u8; 32]);
        let descriptor = create_group(b"correct horse battery staple").expect("create group");
        let members = vec!["alice".to_string(), "bob".to_string()];

        save(&conn, &file_key, &descriptor, "book club", &members).expect("save");

        let loaded = load(&conn, &file_key).expect("load").expect("some group");
        assert_eq!(loaded.group_id, descriptor.group_id);
        assert_eq!(&loaded.group_key, descriptor.group_key());
        assert_eq!(loaded.salt, descriptor.salt);
        assert_eq!(loaded.name, "book club");
        assert_eq!(loaded.members, members);
    }

    #[test]
    fn test_save_replaces_existing() {
        let conn = test_db();
        let file_key = FileKey::from_bytes([3u8; 32]);
        let first = create_group(b"first passphrase").expect("create first");
        save(&conn, &file_key, &first, "first group", &[]).expect("save first");

        let second = create_group(b"second passphrase").expect("create second");
        save(&conn, &file_key, &second, "second group", &[]).expect("save second");

        let loaded = load(&conn, &file_key).expect("load").expect("some group");
        assert_eq!(loaded.group_id, second.group_id);
        assert_eq!(loaded.name, "second group");
    }

    #[test]
    fn test_clear() {
        let conn = test_db();
        let file_key = FileKey::from_bytes([4u8; 32]);
        let descriptor = create_group(b"passphrase").expect("create");
        save(&conn, &file_key, &descriptor, "group", &[]).expect("save");

        clear(&conn).expect("clear");
        assert!(load(&conn, &file_key).expect("load").is_none());
    }

    #[test]
    fn test_wrong_file_key_fails_to_decrypt() {
        let conn = test_db();
        let file_key = FileKey::from_bytes([5u8; 32]);
        let descriptor = create_group(b"passphrase").expect("create");
        save(&conn, &file_key, &descriptor, "group", &[]).expect("save");

        let wrong_key = FileKey::from_bytes([6u8; 32]);
        let result = load(&conn, &wrong_key);
        assert!(matches!(result, Err(StorageError::DecryptionFailed)));
    }
}
