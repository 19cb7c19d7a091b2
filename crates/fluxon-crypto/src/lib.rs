//! # fluxon-crypto
//!
//! Cryptographic primitives for the Fluxon mesh messaging core.
//!
//! No algorithm negotiation is permitted — the cryptographic suite is fixed.
//! This crate is a thin, audited-library wrapper; the state machines that
//! use these primitives (the Noise engine, the session manager, the group
//! cipher) live in their own crates.
//!
//! ## Modules
//!
//! - [`x25519`] — X25519 key agreement (RFC 7748), static and ephemeral keys
//! - [`ed25519`] — Ed25519 detached signing and verification (RFC 8032)
//! - [`chacha20`] — ChaCha20-Poly1305 IETF AEAD (RFC 8439), 96-bit nonce
//! - [`xchacha20`] — XChaCha20-Poly1305 IETF AEAD, 192-bit random nonce
//! - [`argon2id`] — Argon2id password hashing (group passphrase derivation)
//! - [`blake2b`] — Domain-separated BLAKE2b hashing (PeerId, group id)
//! - [`constant_time`] — Constant-time byte equality for secret comparisons
//! - [`csprng`] — OS-backed CSPRNG wrapper for nonces, salts, and jitter

pub mod argon2id;
pub mod blake2b;
pub mod chacha20;
pub mod constant_time;
pub mod csprng;
pub mod ed25519;
pub mod x25519;
pub mod xchacha20;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// AEAD decryption failed (authentication tag mismatch).
    #[error("AEAD decryption failed")]
    AeadDecryption,

    /// Argon2id derivation failed.
    #[error("argon2id error: {0}")]
    Argon2(String),

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Invalid input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
