//! The node's own keypairs: the X25519 static secret used for Noise
//! handshakes and the Ed25519 signing secret used for packet signatures and
//! the TOFU trust anchor. Exactly one row ever exists (`id = 1`); a second
//! call to [`store`] overwrites it.

use std::time::{SystemTime, UNIX_EPOCH};

use fluxon_crypto::ed25519::SigningKey;
use fluxon_crypto::x25519::X25519StaticSecret;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{FileKey, Result, StorageError};

const AAD: &[u8] = b"fluxon-storage/identity/v1";

/// The node's persisted long-term keypairs.
pub struct Identity {
    pub static_secret: X25519StaticSecret,
    pub signing_secret: SigningKey,
}

/// Seal and store the node's keypairs, replacing any existing identity.
pub fn store(conn: &Connection, file_key: &FileKey, identity: &Identity) -> Result<()> {
    let static_public = identity.static_secret.public_key().to_bytes();
    let static_secret_sealed =
        fluxon_crypto::xchacha20::seal(file_key.as_bytes(), &identity.static_secret.to_bytes(), AAD)?;

    let signing_public = identity.signing_secret.verifying_key().to_bytes();
    let signing_secret_sealed =
        fluxon_crypto::xchacha20::seal(file_key.as_bytes(), &identity.signing_secret.to_bytes(), AAD)?;

    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    conn.execute(
        "INSERT OR REPLACE INTO identity
            (id, static_public, static_secret_sealed, signing_public, signing_secret_sealed, created_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)",
        params![
            static_public.as_slice(),
            static_secret_sealed,
            signing_public.as_slice(),
            signing_secret_sealed,
            created_at,
        ],
    )?;

    Ok(())
}

/// Load and unseal the node's keypairs, if one has been stored.
pub fn load(conn: &Connection, file_key: &FileKey) -> Result<Option<Identity>> {
    let row: Option<(Vec<u8>, Vec<u8>)> = conn
        .query_row(
            "SELECT static_secret_sealed, signing_secret_sealed FROM identity WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((static_secret_sealed, signing_secret_sealed)) = row else {
        return Ok(None);
    };

    let static_secret_bytes = fluxon_crypto::xchacha20::open(file_key.as_bytes(), &static_secret_sealed, AAD)
        .map_err(|_| StorageError::DecryptionFailed)?;
    let static_secret_bytes: [u8; 32] = static_secret_bytes
        .try_into()
        .map_err(|_| StorageError::Malformed("static secret length".into()))?;

    let signing_secret_bytes = fluxon_crypto::xchacha20::open(file_key.as_bytes(), &signing_secret_sealed, AAD)
        .map_err(|_| StorageError::DecryptionFailed)?;
    let signing_secret_bytes: [u8; 32] = signing_secret_bytes
        .try_into()
        .map_err(|_| StorageError::Malformed("signing secret length".into()))?;

    Ok(Some(Identity {
        static_secret: X25519StaticSecret::from_bytes(static_secret_bytes),
        signing_secret: SigningKey::from_bytes(&signing_secret_bytes),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_load_missing_returns_none() {
        let conn = test_db();
        let file_key = FileKey::from_bytes([7u8; 32]);
        assert!(load(&conn, &file_key).expect("load").is_none());
    }

    #[test]
    fn test_store_and_load_roundtrip() {
        let conn = test_db();
        let file_key = FileKey::from_bytes([9u8; 32]);

        let identity = Identity {
            static_secret: X25519StaticSecret::random(),
            signing_secret: SigningKey::generate(),
        };
        let expected_static_public = identity.static_secret.public_key().to_bytes();
        let expected_signing_public = identity.signing_secret.verifying_key().to_bytes();

        store(&conn, &file_key, &identity).expect("store");

        let loaded = load(&conn, &file_key).expect("load").expect("some identity");
        assert_eq!(loaded.static_secret.public_key().to_bytes(), expected_static_public);
        assert_eq!(loaded.signing_secret.verifying_key().to_bytes(), expected_signing_public);
    }

    #[test]
    fn test_wrong_file_key_fails_to_decrypt() {
        let conn = test_db();
        let file_key = FileKey::from_bytes([1u8; 32]);
        let identity = Identity {
            static_secret: X25519StaticSecret::random(),
            signing_secret: SigningKey::generate(),
        };
        store(&conn, &file_key, &identity).expect("store");

        let wrong_key = FileKey::from_bytes([2u8; 32]);
        let result = load(&conn, &wrong_key);
        assert!(matches!(result, Err(StorageError::DecryptionFailed)));
    }

    #[test]
    fn test_store_overwrites_existing() {
        let conn = test_db();
        let file_key = FileKey::from_bytes([3u8; 32]);

        let first = Identity {
            static_secret: X25519StaticSecret::random(),
            signing_secret: SigningKey::generate(),
        };
        store(&conn, &file_key, &first).expect("store first");

        let second = Identity {
            static_secret: X25519StaticSecret::random(),
            signing_secret: SigningKey::generate(),
        };
        let expected_public = second.static_secret.public_key().to_bytes();
        store(&conn, &file_key, &second).expect("store second");

        let loaded = load(&conn, &file_key).expect("load").expect("some identity");
        assert_eq!(loaded.static_secret.public_key().to_bytes(), expected_public);
    }
}
