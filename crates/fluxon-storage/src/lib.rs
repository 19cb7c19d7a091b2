//! # fluxon-storage
//!
//! The at-rest persistence adapter (§6): an encrypted key-value surface,
//! backed by `rusqlite`, holding exactly what the core needs to survive a
//! restart — the node's static and signing keypairs, the TOFU trust store's
//! pinned signing keys by [`fluxon_types::PeerId`], and the active group
//! descriptor. Key material is sealed with [`fluxon_crypto::xchacha20`]
//! under a caller-supplied device file key before it ever reaches SQLite;
//! this crate never sees a passphrase or an unwrapped key outside the
//! lifetime of a single call.
//!
//! This is deliberately a thin adapter, not a chat-history store: message
//! history, contacts, and anything resembling application state are out of
//! scope (§1 — local persistence of chat history is an external
//! collaborator's concern).
//!
//! ## Modules
//!
//! - [`schema`] — the SQL schema, applied once on a fresh database
//! - [`migrations`] — forward-only schema version management
//! - [`queries::identity`] — static/signing keypair storage
//! - [`queries::trust`] — pinned signing keys by PeerId
//! - [`queries::group`] — the single active group descriptor

pub mod migrations;
pub mod queries;
pub mod schema;

use std::path::Path;

use rusqlite::Connection;
use zeroize::Zeroize;

/// The symmetric key every at-rest record is sealed under before it reaches
/// SQLite. How it is produced (OS keychain, or Argon2id over an unlock
/// passphrase) is the daemon's policy, not this crate's; this crate only
/// ever holds it for the duration of a single seal/open call.
#[derive(Clone)]
pub struct FileKey([u8; 32]);

impl FileKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Storage-layer error types.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("at-rest decryption failed: wrong device key or corrupted record")]
    DecryptionFailed,

    #[error("crypto error: {0}")]
    Crypto(#[from] fluxon_crypto::CryptoError),

    #[error("malformed stored record: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Open or create the database at `path`. Configures WAL mode and runs any
/// pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database, for tests and the daemon's ephemeral mode.
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory_applies_schema() {
        let conn = open_memory().expect("open in-memory db");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("get user_version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_memory().expect("open");
        let fk: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("get foreign_keys");
        assert_eq!(fk, 1);
    }
}
