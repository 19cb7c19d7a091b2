//! Schema for the Fluxon at-rest store (§6). Four tables: the node's own
//! identity keypairs (one row, id fixed to 1), the TOFU trust store, the
//! single active group descriptor (one row, id fixed to 1), and a small
//! settings table for daemon-level flags that aren't worth their own table.

/// Initial schema, applied once when `PRAGMA user_version` is 0.
pub const SCHEMA_V1: &str = "
CREATE TABLE identity (
    id                     INTEGER PRIMARY KEY CHECK (id = 1),
    static_public          BLOB NOT NULL,
    static_secret_sealed   BLOB NOT NULL,
    signing_public         BLOB NOT NULL,
    signing_secret_sealed  BLOB NOT NULL,
    created_at             INTEGER NOT NULL
);

CREATE TABLE trust_store (
    peer_id             BLOB PRIMARY KEY,
    signing_public_key  BLOB NOT NULL,
    pinned_at           INTEGER NOT NULL
);

CREATE TABLE active_group (
    id                INTEGER PRIMARY KEY CHECK (id = 1),
    group_id          BLOB NOT NULL,
    group_key_sealed  BLOB NOT NULL,
    salt              BLOB NOT NULL,
    name              TEXT NOT NULL,
    members_json      TEXT NOT NULL,
    created_at        INTEGER NOT NULL
);

CREATE TABLE settings (
    key     TEXT PRIMARY KEY,
    value   TEXT NOT NULL
);
";
