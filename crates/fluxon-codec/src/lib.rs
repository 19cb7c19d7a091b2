//! # fluxon-codec
//!
//! The fixed-layout binary wire format for mesh packets, plus the typed
//! payload codecs carried inside it and the Ed25519 signature trailer that
//! binds a packet to its sender.
//!
//! ## Architecture
//!
//! ```text
//! Packet (packet.rs)     -- 78-byte fixed header + bounded payload + optional signature
//!     |
//!     v
//! typed payload (payload.rs) -- chat / location / emergency / discovery / receipt
//!     |
//!     v
//! signature (signature.rs)   -- Ed25519 over the canonical unsigned encoding
//! ```
//!
//! ## Modules
//!
//! - [`packet`] — [`packet::Packet`], [`packet::MessageType`], header
//!   encode/decode, the packet-id fingerprint
//! - [`payload`] — bounds-checked typed payload encode/decode
//! - [`signature`] — sign/verify the canonical unsigned encoding

pub mod packet;
pub mod payload;
pub mod signature;

pub use packet::{CodecConfig, MessageType, Packet, PacketId};

/// Error types for codec operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer is shorter than the fixed 78-byte header.
    #[error("frame shorter than header")]
    FrameTooShort,

    /// `version` is not the one fixed protocol version this codec speaks.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// `type` is not a recognized [`MessageType`] value.
    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),

    /// `ttl` exceeds the configured maximum.
    #[error("ttl {0} exceeds maximum")]
    TtlOutOfRange(u8),

    /// `payload_len` exceeds the maximum payload size.
    #[error("payload_len {0} exceeds maximum")]
    PayloadTooLarge(u16),

    /// `timestamp_ms` is further from local wall time than the allowed skew.
    #[error("timestamp outside allowed clock skew")]
    TimestampOutOfRange,

    /// Trailing bytes after the header+payload are not exactly 0 or 64
    /// bytes, or the signed form was required but absent.
    #[error("malformed signature trailer")]
    MalformedSignature,

    /// A typed payload failed its own bounds or encoding checks.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// An enum-like payload field held a value with no known mapping.
    #[error("unknown enum value {0}")]
    UnknownEnumValue(u8),

    /// Payload text was not strict UTF-8.
    #[error("payload was not valid UTF-8")]
    InvalidUtf8,

    /// Underlying signing/verification primitive failure.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl From<fluxon_crypto::CryptoError> for CodecError {
    fn from(err: fluxon_crypto::CryptoError) -> Self {
        CodecError::Crypto(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
