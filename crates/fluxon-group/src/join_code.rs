//! Join codes: a human-copyable RFC 4648 base32 encoding of a group's
//! 16-byte Argon2id salt. 16 bytes encodes to exactly 26 base32 characters
//! with no padding.

use data_encoding::BASE32_NOPAD;

use crate::{GroupError, Result};

/// Encode a 16-byte salt as a 26-character join code.
pub fn encode_join_code(salt: &[u8; 16]) -> String {
    BASE32_NOPAD.encode(salt)
}

/// Decode a join code back into its 16-byte salt. Case-insensitive;
/// whitespace around the code is trimmed before decoding.
pub fn decode_join_code(code: &str) -> Result<[u8; 16]> {
    let trimmed = code.trim().to_ascii_uppercase();
    let decoded = BASE32_NOPAD
        .decode(trimmed.as_bytes())
        .map_err(|_| GroupError::InvalidJoinCode)?;
    decoded.try_into().map_err(|_| GroupError::InvalidJoinCode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_26_characters() {
        let salt = [0x42u8; 16];
        assert_eq!(encode_join_code(&salt).len(), 26);
    }

    #[test]
    fn test_roundtrip() {
        let salt = fluxon_crypto::argon2id::generate_salt();
        let code = encode_join_code(&salt);
        let decoded = decode_join_code(&code).expect("decode");
        assert_eq!(decoded, salt);
    }

    #[test]
    fn test_roundtrip_is_case_insensitive() {
        let salt = [0x11u8; 16];
        let code = encode_join_code(&salt).to_lowercase();
        let decoded = decode_join_code(&code).expect("decode lowercase");
        assert_eq!(decoded, salt);
    }

    #[test]
    fn test_garbage_input_rejected() {
        assert!(decode_join_code("not a valid join code!!").is_err());
    }

    #[test]
    fn test_wrong_length_rejected() {
        // Valid base32 for an 8-byte payload, not 16.
        let code = BASE32_NOPAD.encode(&[0u8; 8]);
        assert!(decode_join_code(&code).is_err());
    }
}
