//! # fluxon-session
//!
//! Per-peer session lifecycle on top of `fluxon-noise`: driving the XX
//! handshake to completion, pinning the peer's Ed25519 signing key on first
//! contact (TOFU), rate-limiting handshake attempts, and holding the
//! established transport ciphers until the message-count rekey threshold is
//! reached.
//!
//! ## Modules
//!
//! - [`manager`] — [`manager::SessionManager`], the bounded (LRU, ≤500
//!   peers) table of [`manager::PeerSlot`] state machines
//! - [`trust`] — [`trust::TrustStore`], the separate TOFU pinning table that
//!   survives session teardown and rekey
//! - [`ratelimit`] — [`ratelimit::SlidingWindowLimiter`], the sliding-window
//!   counter backing both the per-peer and global handshake attempt budgets

pub mod manager;
pub mod ratelimit;
pub mod trust;

pub use manager::{EstablishedSession, PeerSlot, PeerState, SessionManager};
pub use trust::TrustStore;

/// Default capacity for the peer-slot table and the trust store (§4.4,
/// bounded-resource invariant).
pub const DEFAULT_PEER_CAPACITY: usize = 500;

/// Default message-count threshold at which a session is torn down and a
/// fresh handshake is required.
pub const DEFAULT_REKEY_THRESHOLD: u32 = 1_000_000;

/// Default per-peer handshake attempt budget: at most this many attempts
/// to the same peer per [`DEFAULT_PER_PEER_HANDSHAKE_WINDOW`].
pub const DEFAULT_PER_PEER_HANDSHAKE_LIMIT: usize = 5;

/// Sliding window over which [`DEFAULT_PER_PEER_HANDSHAKE_LIMIT`] applies.
pub const DEFAULT_PER_PEER_HANDSHAKE_WINDOW: std::time::Duration = std::time::Duration::from_secs(60);

/// Default global handshake attempt budget across all peers: at most this
/// many attempts per [`DEFAULT_GLOBAL_HANDSHAKE_WINDOW`].
pub const DEFAULT_GLOBAL_HANDSHAKE_LIMIT: usize = 20;

/// Sliding window over which [`DEFAULT_GLOBAL_HANDSHAKE_LIMIT`] applies.
pub const DEFAULT_GLOBAL_HANDSHAKE_WINDOW: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No slot exists for this peer yet (the caller must call
    /// `initiate_handshake` or wait for an inbound handshake message first).
    #[error("unknown peer")]
    UnknownPeer,

    /// The peer slot is not in the state the requested operation needs
    /// (e.g. encrypting before the handshake has finished).
    #[error("peer is not in the expected session state")]
    WrongState,

    /// Either this peer's or the node's global handshake attempt budget for
    /// the current sliding window is exhausted.
    #[error("handshake rate limit exceeded")]
    RateLimited,

    /// The peer's signing key did not match the key pinned on first
    /// contact.
    #[error("peer signing key does not match previously pinned key")]
    KeyMismatch,

    /// The decoded handshake payload was not a valid Ed25519 public key.
    #[error("invalid signing key in handshake payload")]
    InvalidSigningKey,

    /// Underlying Noise handshake or transport cipher failure.
    #[error("noise error: {0}")]
    Noise(#[from] fluxon_noise::NoiseError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
