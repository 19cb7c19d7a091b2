//! Settings query functions, for small daemon-level flags not worth their
//! own table.

use rusqlite::Connection;

use crate::{Result, StorageError};

/// Get a setting value by key.
pub fn get(conn: &Connection, key: &str) -> Result<String> {
    conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StorageError::NotFound(format!("setting '{key}'")),
        other => StorageError::Sqlite(other),
    })
}

/// Set a setting value.
pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// Get a setting as a boolean, defaulting to `default` if not found.
pub fn get_bool(conn: &Connection, key: &str, default: bool) -> Result<bool> {
    match get(conn, key) {
        Ok(v) => Ok(v == "true" || v == "1"),
        Err(StorageError::NotFound(_)) => Ok(default),
        Err(e) => Err(e),
    }
}

/// Get a setting as u64, defaulting to `default` if not found.
pub fn get_u64(conn: &Connection, key: &str, default: u64) -> Result<u64> {
    match get(conn, key) {
        Ok(v) => v
            .parse()
            .map_err(|e: std::num::ParseIntError| StorageError::Malformed(e.to_string())),
        Err(StorageError::NotFound(_)) => Ok(default),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_get_nonexistent() {
        let conn = test_db();
        let result = get(&conn, "nonexistent");
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_set_and_get() {
        let conn = test_db();
        set(&conn, "relay_enabled", "false").expect("set");
        let v = get(&conn, "relay_enabled").expect("get");
        assert_eq!(v, "false");
    }

    #[test]
    fn test_get_bool_default_and_set() {
        let conn = test_db();
        let flag = get_bool(&conn, "advanced_mode", false).expect("get default");
        assert!(!flag);

        set(&conn, "advanced_mode", "true").expect("set");
        let flag = get_bool(&conn, "advanced_mode", false).expect("get");
        assert!(flag);
    }

    #[test]
    fn test_get_u64_default_and_set() {
        let conn = test_db();
        let v = get_u64(&conn, "rekey_threshold", 0).expect("get default");
        assert_eq!(v, 0);

        set(&conn, "rekey_threshold", "4294967296").expect("set");
        let v = get_u64(&conn, "rekey_threshold", 0).expect("get");
        assert_eq!(v, 4_294_967_296);
    }
}
