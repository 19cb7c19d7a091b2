//! Typed payload codecs carried inside a [`crate::packet::Packet`]'s payload
//! bytes (§6). Every codec here is bounds-checked and rejects malformed
//! UTF-8 outright — none of them reach for a lenient decoder. Unknown
//! enum-like values (emergency kind, receipt kind) are errors, never
//! defaulted.

use fluxon_types::PeerId;

use crate::{CodecError, Result};

/// Maximum encoded length of a chat message's text field.
pub const MAX_CHAT_TEXT_LEN: usize = 400;
/// Maximum encoded length of a chat message's optional sender name.
pub const MAX_CHAT_NAME_LEN: usize = 64;
/// Maximum number of claimed neighbors in a discovery/topology payload.
pub const MAX_DISCOVERY_NEIGHBORS: usize = 10;
/// Maximum length of an emergency free-text message, in UTF-8 bytes.
pub const MAX_EMERGENCY_MSG_LEN: usize = 256;
/// Maximum number of receipts in one batched-receipt payload.
pub const MAX_BATCHED_RECEIPTS: usize = 11;

/// `chat` payload (§6): `{ "t": string, "n"?: string }`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
struct ChatWire {
    t: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatPayload {
    pub text: String,
    pub name: Option<String>,
}

impl ChatPayload {
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.text.len() > MAX_CHAT_TEXT_LEN {
            return Err(CodecError::InvalidPayload("chat text too long".into()));
        }
        if let Some(name) = &self.name {
            if name.len() > MAX_CHAT_NAME_LEN {
                return Err(CodecError::InvalidPayload("chat name too long".into()));
            }
        }
        let wire = ChatWire {
            t: self.text.clone(),
            n: self.name.clone(),
        };
        serde_json::to_vec(&wire).map_err(|e| CodecError::InvalidPayload(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let text_str = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        let wire: ChatWire =
            serde_json::from_str(text_str).map_err(|e| CodecError::InvalidPayload(e.to_string()))?;
        if wire.t.len() > MAX_CHAT_TEXT_LEN {
            return Err(CodecError::InvalidPayload("chat text too long".into()));
        }
        if let Some(name) = &wire.n {
            if name.len() > MAX_CHAT_NAME_LEN {
                return Err(CodecError::InvalidPayload("chat name too long".into()));
            }
        }
        Ok(Self {
            text: wire.t,
            name: wire.n,
        })
    }
}

/// `location` payload (§6): six big-endian fields, 32 bytes total.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocationPayload {
    pub lat: f64,
    pub lon: f64,
    pub accuracy: f32,
    pub alt: f32,
    pub speed: f32,
    pub bearing: f32,
}

const LOCATION_LEN: usize = 8 + 8 + 4 + 4 + 4 + 4;

impl LocationPayload {
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut out = Vec::with_capacity(LOCATION_LEN);
        out.extend_from_slice(&self.lat.to_be_bytes());
        out.extend_from_slice(&self.lon.to_be_bytes());
        out.extend_from_slice(&self.accuracy.to_be_bytes());
        out.extend_from_slice(&self.alt.to_be_bytes());
        out.extend_from_slice(&self.speed.to_be_bytes());
        out.extend_from_slice(&self.bearing.to_be_bytes());
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != LOCATION_LEN {
            return Err(CodecError::InvalidPayload("location payload wrong length".into()));
        }
        let lat = f64::from_be_bytes(bytes[0..8].try_into().expect("8 bytes"));
        let lon = f64::from_be_bytes(bytes[8..16].try_into().expect("8 bytes"));
        let accuracy = f32::from_be_bytes(bytes[16..20].try_into().expect("4 bytes"));
        let alt = f32::from_be_bytes(bytes[20..24].try_into().expect("4 bytes"));
        let speed = f32::from_be_bytes(bytes[24..28].try_into().expect("4 bytes"));
        let bearing = f32::from_be_bytes(bytes[28..32].try_into().expect("4 bytes"));
        let payload = Self {
            lat,
            lon,
            accuracy,
            alt,
            speed,
            bearing,
        };
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(CodecError::InvalidPayload("latitude out of range".into()));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(CodecError::InvalidPayload("longitude out of range".into()));
        }
        if !self.accuracy.is_finite() || self.accuracy < 0.0 {
            return Err(CodecError::InvalidPayload("accuracy must be finite and non-negative".into()));
        }
        if !self.alt.is_finite() {
            return Err(CodecError::InvalidPayload("altitude must be finite".into()));
        }
        if !self.speed.is_finite() {
            return Err(CodecError::InvalidPayload("speed must be finite".into()));
        }
        if !self.bearing.is_finite() {
            return Err(CodecError::InvalidPayload("bearing must be finite".into()));
        }
        Ok(())
    }
}

/// Emergency alert kind (§6). Unknown wire values are a decode error, never
/// defaulted to a particular variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EmergencyKind {
    Medical = 0x01,
    Fire = 0x02,
    Security = 0x03,
    General = 0x04,
}

impl TryFrom<u8> for EmergencyKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(EmergencyKind::Medical),
            0x02 => Ok(EmergencyKind::Fire),
            0x03 => Ok(EmergencyKind::Security),
            0x04 => Ok(EmergencyKind::General),
            other => Err(CodecError::UnknownEnumValue(other)),
        }
    }
}

/// `emergency` payload (§6): `kind(1) | lat(8) | lon(8) | msgLen(2) | msg`.
#[derive(Clone, Debug, PartialEq)]
pub struct EmergencyPayload {
    pub kind: EmergencyKind,
    pub lat: f64,
    pub lon: f64,
    pub msg: String,
}

impl EmergencyPayload {
    pub fn encode(&self) -> Result<Vec<u8>> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(CodecError::InvalidPayload("latitude out of range".into()));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(CodecError::InvalidPayload("longitude out of range".into()));
        }
        let msg_bytes = self.msg.as_bytes();
        if msg_bytes.len() > MAX_EMERGENCY_MSG_LEN {
            return Err(CodecError::InvalidPayload("emergency message too long".into()));
        }
        let mut out = Vec::with_capacity(1 + 8 + 8 + 2 + msg_bytes.len());
        out.push(self.kind as u8);
        out.extend_from_slice(&self.lat.to_be_bytes());
        out.extend_from_slice(&self.lon.to_be_bytes());
        out.extend_from_slice(&(msg_bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(msg_bytes);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 1 + 8 + 8 + 2 {
            return Err(CodecError::InvalidPayload("emergency payload too short".into()));
        }
        let kind = EmergencyKind::try_from(bytes[0])?;
        let lat = f64::from_be_bytes(bytes[1..9].try_into().expect("8 bytes"));
        let lon = f64::from_be_bytes(bytes[9..17].try_into().expect("8 bytes"));
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CodecError::InvalidPayload("latitude out of range".into()));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(CodecError::InvalidPayload("longitude out of range".into()));
        }
        let msg_len = u16::from_be_bytes(bytes[17..19].try_into().expect("2 bytes")) as usize;
        if msg_len > MAX_EMERGENCY_MSG_LEN {
            return Err(CodecError::InvalidPayload("emergency message too long".into()));
        }
        let msg_end = 19usize.checked_add(msg_len).ok_or(CodecError::InvalidPayload("length overflow".into()))?;
        if bytes.len() != msg_end {
            return Err(CodecError::InvalidPayload("emergency payload length mismatch".into()));
        }
        let msg = std::str::from_utf8(&bytes[19..msg_end])
            .map_err(|_| CodecError::InvalidUtf8)?
            .to_string();
        Ok(Self { kind, lat, lon, msg })
    }
}

/// `discovery` / `topology_announce` payload (§6): `n(1) | PeerId * n`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryPayload {
    pub neighbors: Vec<PeerId>,
}

impl DiscoveryPayload {
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.neighbors.len() > MAX_DISCOVERY_NEIGHBORS {
            return Err(CodecError::InvalidPayload("too many claimed neighbors".into()));
        }
        let mut out = Vec::with_capacity(1 + 32 * self.neighbors.len());
        out.push(self.neighbors.len() as u8);
        for peer in &self.neighbors {
            out.extend_from_slice(peer.as_bytes());
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(CodecError::InvalidPayload("discovery payload empty".into()));
        }
        let n = bytes[0] as usize;
        if n > MAX_DISCOVERY_NEIGHBORS {
            return Err(CodecError::InvalidPayload("too many claimed neighbors".into()));
        }
        let expected_len = 1 + n * 32;
        if bytes.len() != expected_len {
            return Err(CodecError::InvalidPayload("discovery payload length mismatch".into()));
        }
        let mut neighbors = Vec::with_capacity(n);
        for i in 0..n {
            let start = 1 + i * 32;
            let mut id = [0u8; 32];
            id.copy_from_slice(&bytes[start..start + 32]);
            neighbors.push(PeerId::from_bytes(id));
        }
        Ok(Self { neighbors })
    }
}

/// Receipt kind (§6). Unknown wire values are a decode error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ReceiptKind {
    Delivered = 0x01,
    Read = 0x02,
    Failed = 0x03,
}

impl TryFrom<u8> for ReceiptKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(ReceiptKind::Delivered),
            0x02 => Ok(ReceiptKind::Read),
            0x03 => Ok(ReceiptKind::Failed),
            other => Err(CodecError::UnknownEnumValue(other)),
        }
    }
}

/// `receipt` payload (§6): `kind(1) | original_packet_id(varbytes) |
/// original_timestamp(8) | original_source(32)`. `varbytes` is a u16
/// length prefix followed by that many raw bytes — wide enough for the
/// colon-delimited hex packet-id fingerprint (§4.1) carried here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptPayload {
    pub kind: ReceiptKind,
    pub original_packet_id: Vec<u8>,
    pub original_timestamp: u64,
    pub original_source: PeerId,
}

/// Maximum length of the `original_packet_id` varbytes field.
pub const MAX_PACKET_ID_LEN: usize = 256;

impl ReceiptPayload {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.original_packet_id.len() > MAX_PACKET_ID_LEN {
            return Err(CodecError::InvalidPayload("receipt packet id too long".into()));
        }
        out.push(self.kind as u8);
        out.extend_from_slice(&(self.original_packet_id.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.original_packet_id);
        out.extend_from_slice(&self.original_timestamp.to_be_bytes());
        out.extend_from_slice(self.original_source.as_bytes());
        Ok(())
    }

    fn decode_from(bytes: &[u8], offset: &mut usize) -> Result<Self> {
        let remaining = &bytes[*offset..];
        if remaining.len() < 1 + 2 {
            return Err(CodecError::InvalidPayload("receipt too short".into()));
        }
        let kind = ReceiptKind::try_from(remaining[0])?;
        let id_len = u16::from_be_bytes(remaining[1..3].try_into().expect("2 bytes")) as usize;
        if id_len > MAX_PACKET_ID_LEN {
            return Err(CodecError::InvalidPayload("receipt packet id too long".into()));
        }
        let id_start = 3;
        let id_end = id_start
            .checked_add(id_len)
            .ok_or(CodecError::InvalidPayload("length overflow".into()))?;
        let tail_end = id_end
            .checked_add(8 + 32)
            .ok_or(CodecError::InvalidPayload("length overflow".into()))?;
        if remaining.len() < tail_end {
            return Err(CodecError::InvalidPayload("receipt too short".into()));
        }
        let original_packet_id = remaining[id_start..id_end].to_vec();
        let ts_start = id_end;
        let original_timestamp =
            u64::from_be_bytes(remaining[ts_start..ts_start + 8].try_into().expect("8 bytes"));
        let src_start = ts_start + 8;
        let mut source_bytes = [0u8; 32];
        source_bytes.copy_from_slice(&remaining[src_start..src_start + 32]);
        let original_source = PeerId::from_bytes(source_bytes);

        *offset += tail_end;
        Ok(Self {
            kind,
            original_packet_id,
            original_timestamp,
            original_source,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let receipt = Self::decode_from(bytes, &mut offset)?;
        if offset != bytes.len() {
            return Err(CodecError::InvalidPayload("trailing bytes after receipt".into()));
        }
        Ok(receipt)
    }
}

/// `ack` batched-receipt payload (§6): `count(1, <= 11) | Receipt * count`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchedReceiptPayload {
    pub receipts: Vec<ReceiptPayload>,
}

impl BatchedReceiptPayload {
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.receipts.len() > MAX_BATCHED_RECEIPTS {
            return Err(CodecError::InvalidPayload("too many batched receipts".into()));
        }
        let mut out = Vec::new();
        out.push(self.receipts.len() as u8);
        for receipt in &self.receipts {
            receipt.encode_into(&mut out)?;
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(CodecError::InvalidPayload("batched receipt payload empty".into()));
        }
        let count = bytes[0] as usize;
        if count > MAX_BATCHED_RECEIPTS {
            return Err(CodecError::InvalidPayload("too many batched receipts".into()));
        }
        let mut offset = 1;
        let mut receipts = Vec::with_capacity(count);
        for _ in 0..count {
            receipts.push(ReceiptPayload::decode_from(bytes, &mut offset)?);
        }
        if offset != bytes.len() {
            return Err(CodecError::InvalidPayload("trailing bytes after batched receipts".into()));
        }
        Ok(Self { receipts })
    }
}
