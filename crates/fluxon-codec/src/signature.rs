//! Sign and verify a [`crate::packet::Packet`] over its canonical unsigned
//! encoding (§4.6). The handshake message type is exempt — the Noise
//! handshake itself authenticates the exchange, so nothing here ever signs
//! or verifies a [`crate::packet::MessageType::Handshake`] packet.

use fluxon_crypto::ed25519::{Signature, SigningKey, VerifyingKey};

use crate::packet::{Packet, SIGNATURE_LEN};
use crate::{CodecError, Result};

/// Attach a fresh Ed25519 signature over `packet.encode_unsigned()`,
/// replacing any signature already present.
pub fn sign_packet(packet: &Packet, signing_key: &SigningKey) -> Packet {
    let message = packet.encode_unsigned();
    let signature = signing_key.sign(&message);
    let mut signed = packet.clone();
    signed.signature = Some(signature.to_bytes());
    signed
}

/// Verify `packet`'s attached signature against `verifying_key` over the
/// packet's canonical unsigned encoding. Returns
/// [`CodecError::MalformedSignature`] if no signature is attached.
pub fn verify_packet(packet: &Packet, verifying_key: &VerifyingKey) -> Result<()> {
    let sig_bytes = packet.signature.ok_or(CodecError::MalformedSignature)?;
    let signature = Signature::from_bytes(&sig_bytes);
    let message = packet.encode_unsigned();
    verifying_key
        .verify(&message, &signature)
        .map_err(|_| CodecError::Crypto(fluxon_crypto::CryptoError::SignatureVerification.to_string()))
}

const _: () = assert!(SIGNATURE_LEN == 64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{CodecConfig, MessageType};
    use fluxon_crypto::ed25519::KeyPair;
    use fluxon_types::PeerId;

    fn peer(byte: u8) -> PeerId {
        PeerId::from_bytes([byte; 32])
    }

    fn sample() -> Packet {
        Packet::new(MessageType::Chat, 7, 0, 1_000, peer(1), peer(2), b"hi".to_vec())
            .expect("valid packet")
    }

    #[test]
    fn test_sign_then_verify_succeeds() {
        let kp = KeyPair::generate();
        let packet = sample();
        let signed = sign_packet(&packet, &kp.signing_key);
        assert!(verify_packet(&signed, &kp.verifying_key).is_ok());
    }

    #[test]
    fn test_verify_fails_without_signature() {
        let kp = KeyPair::generate();
        let packet = sample();
        let result = verify_packet(&packet, &kp.verifying_key);
        assert!(matches!(result, Err(CodecError::MalformedSignature)));
    }

    #[test]
    fn test_verify_fails_with_wrong_key() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let packet = sample();
        let signed = sign_packet(&packet, &kp1.signing_key);
        assert!(verify_packet(&signed, &kp2.verifying_key).is_err());
    }

    #[test]
    fn test_verify_fails_if_payload_tampered_after_signing() {
        let kp = KeyPair::generate();
        let packet = sample();
        let mut signed = sign_packet(&packet, &kp.signing_key);
        signed.payload = b"tampered".to_vec();
        assert!(verify_packet(&signed, &kp.verifying_key).is_err());
    }

    #[test]
    fn test_sign_roundtrips_through_wire_encoding() {
        let kp = KeyPair::generate();
        let packet = sample();
        let signed = sign_packet(&packet, &kp.signing_key);
        let bytes = signed.encode();
        let decoded = Packet::decode(&bytes, &CodecConfig::default(), 1_000).expect("decode");
        assert!(verify_packet(&decoded, &kp.verifying_key).is_ok());
    }
}
