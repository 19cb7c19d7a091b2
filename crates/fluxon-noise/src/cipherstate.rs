//! The post-handshake transport cipher: a 32-bit send counter placed in the
//! low four bytes of ChaCha20-Poly1305's 96-bit IETF nonce (the high eight
//! bytes are always zero), paired on the receive side with a 1024-entry
//! sliding-window replay filter.
//!
//! A session holds one [`SendCipher`] and one [`RecvCipher`], each keyed
//! from one half of [`crate::handshake::HandshakeOutput`]. The wire counter
//! travels alongside each ciphertext (it is not itself secret) so the
//! receiver can reconstruct the nonce the sender used.

use zeroize::Zeroize;

use crate::{NoiseError, Result};

/// Width of the replay-window bitmap, in bits.
pub const REPLAY_WINDOW_BITS: usize = 1024;
const REPLAY_WINDOW_BYTES: usize = REPLAY_WINDOW_BITS / 8;

fn counter_to_nonce(counter: u32) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[8..12].copy_from_slice(&counter.to_be_bytes());
    nonce
}

/// Encrypts outbound transport messages under a monotonically increasing
/// 32-bit counter.
pub struct SendCipher {
    key: [u8; 32],
    counter: u32,
}

impl SendCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key, counter: 0 }
    }

    /// Encrypt `plaintext` under the next counter value, returning the
    /// counter used alongside the ciphertext so the peer can decrypt it.
    pub fn encrypt(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<(u32, Vec<u8>)> {
        if self.counter == u32::MAX {
            return Err(NoiseError::NonceExhausted);
        }
        let counter = self.counter;
        self.counter += 1;
        let nonce = counter_to_nonce(counter);
        let ct = fluxon_crypto::chacha20::encrypt(&self.key, &nonce, plaintext, aad)?;
        Ok((counter, ct))
    }

    /// Number of messages encrypted so far under this key. The session
    /// manager rekeys (tears down and re-handshakes) well before this
    /// approaches `u32::MAX`.
    pub fn messages_sent(&self) -> u32 {
        self.counter
    }
}

impl Drop for SendCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Decrypts inbound transport messages and rejects replayed or
/// too-old counters via a 1024-bit sliding window anchored at the highest
/// counter value seen so far.
pub struct RecvCipher {
    key: [u8; 32],
    highest_seen: Option<u32>,
    window: [u8; REPLAY_WINDOW_BYTES],
}

impl RecvCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            highest_seen: None,
            window: [0u8; REPLAY_WINDOW_BYTES],
        }
    }

    /// Validate `counter` against the replay window, decrypt, and mark the
    /// counter seen. Returns [`NoiseError::ReplayedMessage`] for a counter
    /// that has already been accepted, or that falls more than
    /// [`REPLAY_WINDOW_BITS`] behind the highest counter seen.
    pub fn decrypt(&mut self, counter: u32, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.check_and_reserve(counter)?;
        let nonce = counter_to_nonce(counter);
        match fluxon_crypto::chacha20::decrypt(&self.key, &nonce, ciphertext, aad) {
            Ok(pt) => {
                self.mark_seen(counter);
                Ok(pt)
            }
            Err(_) => Err(NoiseError::DecryptionFailed),
        }
    }

    fn bit(&self, offset: usize) -> bool {
        let byte = offset / 8;
        let bit = offset % 8;
        self.window[byte] & (1 << bit) != 0
    }

    fn set_bit(&mut self, offset: usize) {
        let byte = offset / 8;
        let bit = offset % 8;
        self.window[byte] |= 1 << bit;
    }

    /// Check whether `counter` is acceptable without mutating `highest_seen`
    /// or the bitmap yet (decryption may still fail after this check).
    fn check_and_reserve(&self, counter: u32) -> Result<()> {
        match self.highest_seen {
            None => Ok(()),
            Some(highest) => {
                if counter > highest {
                    Ok(())
                } else {
                    let age = (highest - counter) as usize;
                    if age >= REPLAY_WINDOW_BITS {
                        return Err(NoiseError::ReplayedMessage);
                    }
                    if self.bit(age) {
                        return Err(NoiseError::ReplayedMessage);
                    }
                    Ok(())
                }
            }
        }
    }

    /// Record `counter` as accepted, sliding the window forward if it is a
    /// new high-water mark.
    fn mark_seen(&mut self, counter: u32) {
        match self.highest_seen {
            None => {
                self.highest_seen = Some(counter);
                self.set_bit(0);
            }
            Some(highest) if counter > highest => {
                let shift = (counter - highest) as usize;
                self.shift_window(shift);
                self.highest_seen = Some(counter);
                self.set_bit(0);
            }
            Some(highest) => {
                let age = (highest - counter) as usize;
                self.set_bit(age);
            }
        }
    }

    fn shift_window(&mut self, shift: usize) {
        if shift >= REPLAY_WINDOW_BITS {
            self.window = [0u8; REPLAY_WINDOW_BYTES];
            return;
        }
        let mut shifted = [0u8; REPLAY_WINDOW_BYTES];
        for bit in 0..REPLAY_WINDOW_BITS {
            let new_bit = bit + shift;
            if new_bit < REPLAY_WINDOW_BITS && self.bit(bit) {
                let byte = new_bit / 8;
                let b = new_bit % 8;
                shifted[byte] |= 1 << b;
            }
        }
        self.window = shifted;
    }
}

impl Drop for RecvCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
