//! Forward-only schema version management, tracked in `PRAGMA user_version`.

use rusqlite::Connection;

use crate::{schema, Result, StorageError, SCHEMA_VERSION};

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<()> {
    let current_version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(StorageError::Sqlite)?;

    if current_version == 0 {
        tracing::info!("initializing storage schema v{SCHEMA_VERSION}");
        conn.execute_batch(schema::SCHEMA_V1).map_err(StorageError::Sqlite)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(StorageError::Sqlite)?;
    } else if current_version < SCHEMA_VERSION {
        for version in (current_version + 1)..=SCHEMA_VERSION {
            tracing::info!("running storage migration to v{version}");
            run_migration(conn, version)?;
            conn.pragma_update(None, "user_version", version)
                .map_err(StorageError::Sqlite)?;
        }
    } else if current_version > SCHEMA_VERSION {
        return Err(StorageError::Migration(format!(
            "database version {current_version} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    Ok(())
}

fn run_migration(_conn: &Connection, version: u32) -> Result<()> {
    match version {
        // Future migrations go here: 2 => migration_v2(conn),
        _ => Err(StorageError::Migration(format!("unknown migration version: {version}"))),
    }
}
