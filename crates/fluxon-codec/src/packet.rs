//! The fixed-layout binary wire packet (§4.1): a 78-byte big-endian header,
//! a bounds-checked payload of at most 512 bytes, and an optional 64-byte
//! Ed25519 signature trailer.
//!
//! ```text
//! offset  bytes  field
//! 0       1      version           (fixed = 1)
//! 1       1      type
//! 2       1      ttl               (1 ..= max_ttl)
//! 3       1      flags
//! 4       8      timestamp_ms
//! 12      32     source_id
//! 44      32     dest_id
//! 76      2      payload_len       (<= 512)
//! 78      N      payload
//! 78+N    0|64   signature
//! ```

use fluxon_types::PeerId;

use crate::{CodecError, Result};

/// Fixed protocol version. Any other value is rejected at decode.
pub const VERSION: u8 = 1;

/// Size of the fixed header, before the variable-length payload.
pub const HEADER_LEN: usize = 78;

/// Maximum payload size in bytes.
pub const MAX_PAYLOAD_LEN: usize = 512;

/// Maximum TTL accepted by default (§4.1).
pub const DEFAULT_MAX_TTL: u8 = 7;

/// Allowed clock skew between a packet's `timestamp_ms` and local wall time.
pub const DEFAULT_CLOCK_SKEW_MS: u64 = 5 * 60 * 1000;

/// Length of the Ed25519 signature trailer.
pub const SIGNATURE_LEN: usize = 64;

/// Message type enumeration (§6). Dispatch is a compile-time match, not a
/// linear scan, per the redesign note against dynamic `fromValue` lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Handshake = 0x01,
    Chat = 0x02,
    TopologyAnnounce = 0x03,
    GossipSync = 0x04,
    Ack = 0x05,
    Ping = 0x06,
    Pong = 0x07,
    Discovery = 0x08,
    NoiseEncrypted = 0x09,
    LocationUpdate = 0x0A,
    GroupJoin = 0x0B,
    GroupJoinResponse = 0x0C,
    GroupKeyRotation = 0x0D,
    EmergencyAlert = 0x0E,
}

impl MessageType {
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Whether this type is exempt from signature verification: the
    /// handshake itself authenticates the exchange (§4.6).
    pub fn is_handshake(self) -> bool {
        matches!(self, MessageType::Handshake)
    }
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(MessageType::Handshake),
            0x02 => Ok(MessageType::Chat),
            0x03 => Ok(MessageType::TopologyAnnounce),
            0x04 => Ok(MessageType::GossipSync),
            0x05 => Ok(MessageType::Ack),
            0x06 => Ok(MessageType::Ping),
            0x07 => Ok(MessageType::Pong),
            0x08 => Ok(MessageType::Discovery),
            0x09 => Ok(MessageType::NoiseEncrypted),
            0x0A => Ok(MessageType::LocationUpdate),
            0x0B => Ok(MessageType::GroupJoin),
            0x0C => Ok(MessageType::GroupJoinResponse),
            0x0D => Ok(MessageType::GroupKeyRotation),
            0x0E => Ok(MessageType::EmergencyAlert),
            other => Err(CodecError::UnknownMessageType(other)),
        }
    }
}

/// Stable identity used by the deduplicator and gossip layer (§4.1): the
/// hex source id, timestamp, type, flags, and a marker for signature
/// presence (first 8 signature bytes, or the literal `"nosig"`). The
/// signature-presence component is mandatory — it keeps a legitimate signed
/// packet and a signature-stripped replay in distinct dedup buckets.
pub type PacketId = String;

/// A fully parsed (or about-to-be-encoded) mesh packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub version: u8,
    pub msg_type: MessageType,
    pub ttl: u8,
    pub flags: u8,
    pub timestamp_ms: u64,
    pub source_id: PeerId,
    pub dest_id: PeerId,
    pub payload: Vec<u8>,
    pub signature: Option<[u8; SIGNATURE_LEN]>,
}

/// Decode-time configuration: the caps that distinguish a strict parse from
/// a lenient one. Callers share one instance across the mesh service.
#[derive(Clone, Copy, Debug)]
pub struct CodecConfig {
    pub max_ttl: u8,
    pub clock_skew_ms: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_ttl: DEFAULT_MAX_TTL,
            clock_skew_ms: DEFAULT_CLOCK_SKEW_MS,
        }
    }
}

impl Packet {
    /// Construct a new packet, rejecting an over-long payload deterministically
    /// rather than truncating it (§4.1).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msg_type: MessageType,
        ttl: u8,
        flags: u8,
        timestamp_ms: u64,
        source_id: PeerId,
        dest_id: PeerId,
        payload: Vec<u8>,
    ) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(CodecError::PayloadTooLarge(payload.len() as u16));
        }
        Ok(Self {
            version: VERSION,
            msg_type,
            ttl,
            flags,
            timestamp_ms,
            source_id,
            dest_id,
            payload,
            signature: None,
        })
    }

    /// The canonical unsigned encoding: header + payload, no trailer. This
    /// is both the wire form of an unsigned packet and the exact byte
    /// string signed/verified by the codec-signature layer (§4.6).
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.push(self.version);
        out.push(self.msg_type.value());
        out.push(self.ttl);
        out.push(self.flags);
        out.extend_from_slice(&self.timestamp_ms.to_be_bytes());
        out.extend_from_slice(self.source_id.as_bytes());
        out.extend_from_slice(self.dest_id.as_bytes());
        out.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// The full wire encoding: unsigned form plus the 64-byte signature
    /// trailer, if attached.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.encode_unsigned();
        if let Some(sig) = &self.signature {
            out.extend_from_slice(sig);
        }
        out
    }

    /// Decode a wire frame. The presence of a 64-byte trailer is determined
    /// unambiguously from `payload_len` and the buffer's total length; any
    /// other trailing length is [`CodecError::MalformedSignature`].
    pub fn decode(bytes: &[u8], config: &CodecConfig, now_ms: u64) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::FrameTooShort);
        }

        let version = bytes[0];
        if version != VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let msg_type = MessageType::try_from(bytes[1])?;

        let ttl = bytes[2];
        if ttl == 0 || ttl > config.max_ttl {
            return Err(CodecError::TtlOutOfRange(ttl));
        }

        let flags = bytes[3];

        let mut ts_bytes = [0u8; 8];
        ts_bytes.copy_from_slice(&bytes[4..12]);
        let timestamp_ms = u64::from_be_bytes(ts_bytes);

        let mut source_bytes = [0u8; 32];
        source_bytes.copy_from_slice(&bytes[12..44]);
        let source_id = PeerId::from_bytes(source_bytes);

        let mut dest_bytes = [0u8; 32];
        dest_bytes.copy_from_slice(&bytes[44..76]);
        let dest_id = PeerId::from_bytes(dest_bytes);

        let mut len_bytes = [0u8; 2];
        len_bytes.copy_from_slice(&bytes[76..78]);
        let payload_len = u16::from_be_bytes(len_bytes);
        if payload_len as usize > MAX_PAYLOAD_LEN {
            return Err(CodecError::PayloadTooLarge(payload_len));
        }

        let payload_end = HEADER_LEN
            .checked_add(payload_len as usize)
            .ok_or(CodecError::FrameTooShort)?;
        if bytes.len() < payload_end {
            return Err(CodecError::FrameTooShort);
        }

        let now = now_ms as i128;
        let skew = (now - timestamp_ms as i128).abs();
        if skew > config.clock_skew_ms as i128 {
            return Err(CodecError::TimestampOutOfRange);
        }

        let payload = bytes[HEADER_LEN..payload_end].to_vec();

        let trailing = &bytes[payload_end..];
        let signature = match trailing.len() {
            0 => None,
            SIGNATURE_LEN => {
                let mut sig = [0u8; SIGNATURE_LEN];
                sig.copy_from_slice(trailing);
                Some(sig)
            }
            _ => return Err(CodecError::MalformedSignature),
        };

        Ok(Self {
            version,
            msg_type,
            ttl,
            flags,
            timestamp_ms,
            source_id,
            dest_id,
            payload,
            signature,
        })
    }

    /// Decode only the signed form; used when a session exists and a
    /// signature is mandatory for non-handshake types (§4.11 step 4).
    pub fn decode_signed(bytes: &[u8], config: &CodecConfig, now_ms: u64) -> Result<Self> {
        let packet = Self::decode(bytes, config, now_ms)?;
        if packet.signature.is_none() {
            return Err(CodecError::MalformedSignature);
        }
        Ok(packet)
    }

    /// The dedup/gossip fingerprint (§4.1).
    pub fn packet_id(&self) -> PacketId {
        let sig_component = match &self.signature {
            Some(sig) => hex::encode(&sig[..8]),
            None => "nosig".to_string(),
        };
        format!(
            "{}:{}:{}:{}:{}",
            hex::encode(self.source_id.as_bytes()),
            self.timestamp_ms,
            self.msg_type.value(),
            self.flags,
            sig_component
        )
    }
}
