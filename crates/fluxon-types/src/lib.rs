//! # fluxon-types
//!
//! Shared identifier types used across the Fluxon mesh messaging workspace:
//! [`PeerId`] (derived from a node's X25519 static public key) and
//! [`GroupId`] (derived from a group's Argon2id-derived key and salt). Both
//! are plain fixed-size byte wrappers — the hashing that produces them lives
//! in `fluxon-crypto`, not here.

pub mod peer;

pub use peer::{GroupId, PeerId};
