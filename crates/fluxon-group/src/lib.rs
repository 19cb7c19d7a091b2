//! # fluxon-group
//!
//! The group-level AEAD layer (§4.5): a shared passphrase, run through
//! Argon2id with a random 16-byte salt, yields both a 32-byte symmetric key
//! and (via a BLAKE2b domain-separated hash) the 16-byte group id peers use
//! to recognize each other's packets without learning the passphrase. The
//! salt round-trips out-of-band as a 26-character RFC 4648 base32 join code.
//!
//! ## Modules
//!
//! - [`descriptor`] — [`descriptor::GroupDescriptor`], `create_group` /
//!   `join_group`
//! - [`join_code`] — join-code encode/decode (base32 over the 16-byte salt)
//! - [`cipher`] — per-message group payload AEAD (ChaCha20-Poly1305 IETF,
//!   random 12-byte nonce, caller-supplied AD)
//!
//! There is no standalone KDF cache: `create_group`/`join_group` are each
//! called exactly once per passphrase entry, and the resulting
//! [`GroupDescriptor`] (not the passphrase) is what gets persisted and
//! reused afterward, so there is no repeated-derivation cost to amortize.

pub mod cipher;
pub mod descriptor;
pub mod join_code;

pub use descriptor::GroupDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    /// The join code was not valid base32, or did not decode to exactly 16
    /// bytes.
    #[error("invalid join code")]
    InvalidJoinCode,

    /// Underlying cryptographic primitive failure (Argon2id derivation, or
    /// AEAD seal/open).
    #[error("crypto error: {0}")]
    Crypto(#[from] fluxon_crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, GroupError>;
