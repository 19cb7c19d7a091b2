//! The `Noise_XX` three-message handshake state machine:
//!
//! ```text
//! -> e
//! <- e, ee, s, es
//! -> s, se
//! ```
//!
//! Message 1 carries no payload. Message 2's payload is the responder's
//! Ed25519 signing public key; message 3's payload is the initiator's.
//! Pinning that signing key against a peer's previously-seen key (TOFU) is
//! the session manager's job, not this crate's — `HandshakeState` only
//! authenticates the X25519 static keys that the Noise pattern itself binds
//! into the transcript.

use fluxon_crypto::x25519::{X25519PublicKey, X25519StaticSecret};

use crate::transcript::SymmetricState;
use crate::{NoiseError, Result};

const EPHEMERAL_LEN: usize = 32;
const ENCRYPTED_STATIC_LEN: usize = 32 + 16;

/// Which side of the handshake this state machine is playing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// The outcome of a completed handshake: the pair of transport keys (already
/// oriented as send/recv for this side) and the peer's authenticated X25519
/// static public key.
pub struct HandshakeOutput {
    pub send_key: [u8; 32],
    pub recv_key: [u8; 32],
    pub remote_static: X25519PublicKey,
}

/// A single XX handshake in progress. Every exit path — successful
/// [`Self::finish`] or an early `Result::Err` that drops the value — zeroizes
/// the chaining key, transcript hash, and any ephemeral secret still held.
pub struct HandshakeState {
    role: Role,
    sym: SymmetricState,
    s: X25519StaticSecret,
    e: Option<X25519StaticSecret>,
    rs: Option<X25519PublicKey>,
    re: Option<X25519PublicKey>,
    step: u8,
}

impl HandshakeState {
    fn new(role: Role, static_secret: X25519StaticSecret) -> Self {
        Self {
            role,
            sym: SymmetricState::initialize(),
            s: static_secret,
            e: None,
            rs: None,
            re: None,
            step: 0,
        }
    }

    pub fn new_initiator(static_secret: X25519StaticSecret) -> Self {
        Self::new(Role::Initiator, static_secret)
    }

    pub fn new_responder(static_secret: X25519StaticSecret) -> Self {
        Self::new(Role::Responder, static_secret)
    }

    /// `-> e`. Initiator only, at step 0.
    pub fn write_message1(&mut self) -> Result<Vec<u8>> {
        if self.role != Role::Initiator || self.step != 0 {
            return Err(NoiseError::UnexpectedStep);
        }
        let e = X25519StaticSecret::random();
        let e_pub = e.public_key();
        self.sym.mix_hash(e_pub.as_bytes());
        let payload_ct = self.sym.encrypt_and_hash(&[])?;

        self.e = Some(e);
        self.step = 1;

        let mut out = Vec::with_capacity(EPHEMERAL_LEN + payload_ct.len());
        out.extend_from_slice(e_pub.as_bytes());
        out.extend_from_slice(&payload_ct);
        Ok(out)
    }

    /// `<- e`. Responder only, at step 0.
    pub fn read_message1(&mut self, msg: &[u8]) -> Result<()> {
        if self.role != Role::Responder || self.step != 0 {
            return Err(NoiseError::UnexpectedStep);
        }
        if msg.len() < EPHEMERAL_LEN {
            return Err(NoiseError::MalformedMessage);
        }
        let (e_bytes, payload_ct) = msg.split_at(EPHEMERAL_LEN);
        let re = X25519PublicKey::from_bytes(to_array32(e_bytes)?);
        self.sym.mix_hash(re.as_bytes());
        self.sym.decrypt_and_hash(payload_ct)?;

        self.re = Some(re);
        self.step = 1;
        Ok(())
    }

    /// `-> e, ee, s, es`. Responder only, at step 1.
    pub fn write_message2(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        if self.role != Role::Responder || self.step != 1 {
            return Err(NoiseError::UnexpectedStep);
        }
        let re = self.re.clone().ok_or(NoiseError::UnexpectedStep)?;

        let e = X25519StaticSecret::random();
        let e_pub = e.public_key();
        self.sym.mix_hash(e_pub.as_bytes());

        let ee = e.diffie_hellman(&re);
        self.sym.mix_key(ee.as_bytes());

        let s_ct = self.sym.encrypt_and_hash(self.s.public_key().as_bytes())?;

        let es = self.s.diffie_hellman(&re);
        self.sym.mix_key(es.as_bytes());

        let payload_ct = self.sym.encrypt_and_hash(payload)?;

        self.e = Some(e);
        self.step = 2;

        let mut out = Vec::with_capacity(EPHEMERAL_LEN + s_ct.len() + payload_ct.len());
        out.extend_from_slice(e_pub.as_bytes());
        out.extend_from_slice(&s_ct);
        out.extend_from_slice(&payload_ct);
        Ok(out)
    }

    /// `<- e, ee, s, es`. Initiator only, at step 1. Returns the responder's
    /// decrypted payload (its signing public key).
    pub fn read_message2(&mut self, msg: &[u8]) -> Result<Vec<u8>> {
        if self.role != Role::Initiator || self.step != 1 {
            return Err(NoiseError::UnexpectedStep);
        }
        if msg.len() < EPHEMERAL_LEN + ENCRYPTED_STATIC_LEN {
            return Err(NoiseError::MalformedMessage);
        }
        let local_e = self.e.clone().ok_or(NoiseError::UnexpectedStep)?;

        let (e_bytes, rest) = msg.split_at(EPHEMERAL_LEN);
        let (s_ct, payload_ct) = rest.split_at(ENCRYPTED_STATIC_LEN);

        let re = X25519PublicKey::from_bytes(to_array32(e_bytes)?);
        self.sym.mix_hash(re.as_bytes());

        let ee = local_e.diffie_hellman(&re);
        self.sym.mix_key(ee.as_bytes());

        let s_pt = self.sym.decrypt_and_hash(s_ct)?;
        let rs = X25519PublicKey::from_bytes(to_array32(&s_pt)?);

        let es = local_e.diffie_hellman(&rs);
        self.sym.mix_key(es.as_bytes());

        let payload = self.sym.decrypt_and_hash(payload_ct)?;

        self.re = Some(re);
        self.rs = Some(rs);
        self.step = 2;
        Ok(payload)
    }

    /// `-> s, se`. Initiator only, at step 2.
    pub fn write_message3(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        if self.role != Role::Initiator || self.step != 2 {
            return Err(NoiseError::UnexpectedStep);
        }
        let re = self.re.clone().ok_or(NoiseError::UnexpectedStep)?;

        let s_ct = self.sym.encrypt_and_hash(self.s.public_key().as_bytes())?;

        let se = self.s.diffie_hellman(&re);
        self.sym.mix_key(se.as_bytes());

        let payload_ct = self.sym.encrypt_and_hash(payload)?;

        self.step = 3;

        let mut out = Vec::with_capacity(s_ct.len() + payload_ct.len());
        out.extend_from_slice(&s_ct);
        out.extend_from_slice(&payload_ct);
        Ok(out)
    }

    /// `<- s, se`. Responder only, at step 2. Returns the initiator's
    /// decrypted payload (its signing public key). The handshake is complete
    /// after this call; call [`Self::finish`] next.
    pub fn read_message3(&mut self, msg: &[u8]) -> Result<Vec<u8>> {
        if self.role != Role::Responder || self.step != 2 {
            return Err(NoiseError::UnexpectedStep);
        }
        if msg.len() < ENCRYPTED_STATIC_LEN {
            return Err(NoiseError::MalformedMessage);
        }
        let local_e = self.e.clone().ok_or(NoiseError::UnexpectedStep)?;
        let (s_ct, payload_ct) = msg.split_at(ENCRYPTED_STATIC_LEN);

        let s_pt = self.sym.decrypt_and_hash(s_ct)?;
        let rs = X25519PublicKey::from_bytes(to_array32(&s_pt)?);

        let se = local_e.diffie_hellman(&rs);
        self.sym.mix_key(se.as_bytes());

        let payload = self.sym.decrypt_and_hash(payload_ct)?;

        self.rs = Some(rs);
        self.step = 3;
        Ok(payload)
    }

    /// Finalize the handshake, deriving the oriented transport key pair.
    /// Consumes `self`, which zeroizes the chaining key, transcript hash,
    /// and any remaining ephemeral secret on return.
    pub fn finish(self) -> Result<HandshakeOutput> {
        if self.step != 3 {
            return Err(NoiseError::UnexpectedStep);
        }
        let remote_static = self.rs.clone().ok_or(NoiseError::UnexpectedStep)?;
        let (k_init_to_resp, k_resp_to_init) = self.sym.split();
        let (send_key, recv_key) = match self.role {
            Role::Initiator => (k_init_to_resp, k_resp_to_init),
            Role::Responder => (k_resp_to_init, k_init_to_resp),
        };
        Ok(HandshakeOutput {
            send_key,
            recv_key,
            remote_static,
        })
    }
}

fn to_array32(bytes: &[u8]) -> Result<[u8; 32]> {
    bytes.try_into().map_err(|_| NoiseError::InvalidPublicKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_handshake() -> (HandshakeOutput, HandshakeOutput, X25519PublicKey, X25519PublicKey) {
        let init_static = X25519StaticSecret::random();
        let resp_static = X25519StaticSecret::random();
        let init_static_pub = init_static.public_key();
        let resp_static_pub = resp_static.public_key();

        let mut initiator = HandshakeState::new_initiator(init_static);
        let mut responder = HandshakeState::new_responder(resp_static);

        let msg1 = initiator.write_message1().expect("write msg1");
        responder.read_message1(&msg1).expect("read msg1");

        let msg2 = responder.write_message2(b"responder-signing-key").expect("write msg2");
        let resp_payload = initiator.read_message2(&msg2).expect("read msg2");
        assert_eq!(resp_payload, b"responder-signing-key");

        let msg3 = initiator.write_message3(b"initiator-signing-key").expect("write msg3");
        let init_payload = responder.read_message3(&msg3).expect("read msg3");
        assert_eq!(init_payload, b"initiator-signing-key");

        let init_out = initiator.finish().expect("initiator finish");
        let resp_out = responder.finish().expect("responder finish");
        (init_out, resp_out, init_static_pub, resp_static_pub)
    }

    #[test]
    fn test_full_handshake_agrees_on_swapped_transport_keys() {
        let (init_out, resp_out, init_pub, resp_pub) = run_handshake();
        assert_eq!(init_out.send_key, resp_out.recv_key);
        assert_eq!(init_out.recv_key, resp_out.send_key);
        assert_eq!(init_out.remote_static.to_bytes(), resp_pub.to_bytes());
        assert_eq!(resp_out.remote_static.to_bytes(), init_pub.to_bytes());
    }

    #[test]
    fn test_send_and_recv_keys_differ() {
        let (init_out, _, _, _) = run_handshake();
        assert_ne!(init_out.send_key, init_out.recv_key);
    }

    #[test]
    fn test_two_handshakes_produce_unlinkable_keys() {
        let (a, _, _, _) = run_handshake();
        let (b, _, _, _) = run_handshake();
        assert_ne!(a.send_key, b.send_key);
    }

    #[test]
    fn test_wrong_step_order_rejected() {
        let s = X25519StaticSecret::random();
        let mut initiator = HandshakeState::new_initiator(s);
        // write_message2 is a responder-only, step-1 operation.
        assert!(initiator.write_message2(b"").is_err());
    }

    #[test]
    fn test_truncated_message1_rejected() {
        let s = X25519StaticSecret::random();
        let mut responder = HandshakeState::new_responder(s);
        assert!(responder.read_message1(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_tampered_message2_fails_responder_static_decrypt() {
        let init_static = X25519StaticSecret::random();
        let resp_static = X25519StaticSecret::random();
        let mut initiator = HandshakeState::new_initiator(init_static);
        let mut responder = HandshakeState::new_responder(resp_static);

        let msg1 = initiator.write_message1().expect("write msg1");
        responder.read_message1(&msg1).expect("read msg1");
        let mut msg2 = responder.write_message2(b"key").expect("write msg2");
        let last = msg2.len() - 1;
        msg2[last] ^= 0xFF;

        assert!(initiator.read_message2(&msg2).is_err());
    }

    #[test]
    fn test_finish_before_step3_rejected() {
        let init_static = X25519StaticSecret::random();
        let resp_static = X25519StaticSecret::random();
        let mut initiator = HandshakeState::new_initiator(init_static);
        let mut responder = HandshakeState::new_responder(resp_static);

        let msg1 = initiator.write_message1().expect("write msg1");
        responder.read_message1(&msg1).expect("read msg1");

        assert!(responder.finish().is_err());
    }
}
