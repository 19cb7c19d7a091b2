//! # fluxon-noise
//!
//! A hand-rolled implementation of `Noise_XX_25519_ChaChaPoly_SHA256`, plus
//! the post-handshake transport `CipherState` with its replay window.
//!
//! This is intentionally not built on top of the `snow` crate: the protocol
//! pins exact internal mechanics (a 32-bit send counter placed in the low
//! four bytes of the 96-bit IETF nonce, a 1024-bit sliding replay-window
//! bitmap, and zeroization on every handshake exit path) that are simpler to
//! guarantee by writing the symmetric-state machinery directly against
//! [`fluxon_crypto`] than by reaching through a general-purpose Noise
//! engine's own abstractions.
//!
//! ## Modules
//!
//! - [`transcript`] — `SymmetricState`: running `(ck, h)` transcript hash and
//!   key schedule shared by all three XX handshake messages
//! - [`handshake`] — `HandshakeState`: the XX pattern's three-message
//!   initiator/responder state machine
//! - [`cipherstate`] — the transport-phase `CipherState` with its 32-bit
//!   nonce counter and 1024-entry replay window

pub mod cipherstate;
pub mod handshake;
pub mod transcript;

/// Errors produced by the Noise handshake and transport cipher.
#[derive(Debug, thiserror::Error)]
pub enum NoiseError {
    /// A handshake message arrived out of the expected three-message order.
    #[error("unexpected handshake step")]
    UnexpectedStep,

    /// A handshake message was the wrong length to contain its expected fields.
    #[error("malformed handshake message")]
    MalformedMessage,

    /// Decryption (of a handshake payload or a transport message) failed.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The peer's ephemeral or static public key was not a valid curve point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// The responder's static key presented in the handshake did not match
    /// a previously pinned (TOFU) key for this peer.
    #[error("static key does not match pinned key")]
    KeyMismatch,

    /// The transport send counter reached its maximum value; the session
    /// must be torn down and re-established.
    #[error("nonce space exhausted, rekey required")]
    NonceExhausted,

    /// The incoming message's counter fell outside the replay window, or
    /// was already marked seen inside it.
    #[error("replayed or expired message counter")]
    ReplayedMessage,

    /// Underlying cryptographic primitive failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] fluxon_crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, NoiseError>;
