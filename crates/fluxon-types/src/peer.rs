//! [`PeerId`] and [`GroupId`]: the two identifier types derived by BLAKE2b
//! hashing elsewhere in the workspace (`fluxon_crypto::blake2b`) and passed
//! around by value everywhere else — the codec, the session manager, the
//! topology tracker, the gossip layer, and the daemon's JSON-lines shell all
//! key their maps and wire fields on these.

use std::fmt;

use fluxon_crypto::x25519::X25519PublicKey;
use serde::{Deserialize, Serialize};

/// BLAKE2b-256 of a node's X25519 static public key. Stable for the lifetime
/// of that keypair; unrelated to the node's Ed25519 signing identity, which
/// is pinned separately via TOFU.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId([u8; 32]);

impl PeerId {
    /// The all-zero PeerId, reserved to mean "broadcast" in a packet's
    /// `dest_id` and "source undefined" in its `source_id`.
    pub const BROADCAST: PeerId = PeerId([0u8; 32]);

    pub fn from_static_public_key(key: &X25519PublicKey) -> Self {
        Self(fluxon_crypto::blake2b::peer_id(key.as_bytes()))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// BLAKE2b-128 over a domain tag, the group's derived key, and its salt.
/// Shared out-of-band (join code) so peers can recognize packets belonging
/// to a group without learning the passphrase or the derived key itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId([u8; 16]);

impl GroupId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        self.0
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", hex::encode(self.0))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
