//! Argon2id password hashing for group passphrase derivation.
//!
//! The only consumer of this module is the group cipher's key derivation:
//! `derived = Argon2id(passphrase, salt, moderate_params, outLen = 48)`,
//! split into a 32-byte group key and fed (with the salt) into the group id
//! hash. Parameters are calibrated so derivation costs ~300-500ms and ~64MiB
//! on a mid-range mobile CPU — expensive enough to resist offline guessing,
//! cheap enough to run once per `create_group`/`join_group` call on a
//! blocking worker (never on the mesh service's event loop).

use argon2::{Algorithm, Argon2, Params, Version};

use crate::{CryptoError, Result};

/// Memory cost in KiB (64 MiB).
pub const MODERATE_M_COST: u32 = 65536;
/// Time cost (iterations).
pub const MODERATE_T_COST: u32 = 3;
/// Parallelism lanes.
pub const MODERATE_P_COST: u32 = 1;
/// Output length: 32-byte group key || 16 bytes fed into the group id hash.
pub const GROUP_DERIVATION_LEN: usize = 48;

/// Maximum accepted passphrase length at the API boundary (§4.5).
pub const MAX_PASSPHRASE_LEN: usize = 128;

/// Derive 48 bytes of key material from a passphrase and 16-byte salt using
/// the "moderate" Argon2id profile.
///
/// Callers split the output as `group_key = out[0..32]`; the remaining 16
/// bytes are not separately used (the group id hash takes `out[0..32]` and
/// the salt directly, per spec), but the wider output keeps this function's
/// shape stable if a future KDF use needs the tail.
pub fn derive_group_material(passphrase: &[u8], salt: &[u8; 16]) -> Result<[u8; GROUP_DERIVATION_LEN]> {
    if passphrase.len() > MAX_PASSPHRASE_LEN {
        return Err(CryptoError::InvalidInput(format!(
            "passphrase exceeds {MAX_PASSPHRASE_LEN} bytes"
        )));
    }
    let params = Params::new(
        MODERATE_M_COST,
        MODERATE_T_COST,
        MODERATE_P_COST,
        Some(GROUP_DERIVATION_LEN),
    )
    .map_err(|e| CryptoError::Argon2(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; GROUP_DERIVATION_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| CryptoError::Argon2(e.to_string()))?;

    Ok(output)
}

/// Derive with caller-supplied parameters, used in tests to avoid paying the
/// full ~300-500ms moderate cost on every run.
pub fn derive_group_material_custom(
    passphrase: &[u8],
    salt: &[u8; 16],
    m_cost: u32,
    t_cost: u32,
    p_cost: u32,
) -> Result<[u8; GROUP_DERIVATION_LEN]> {
    let params = Params::new(m_cost, t_cost, p_cost, Some(GROUP_DERIVATION_LEN))
        .map_err(|e| CryptoError::Argon2(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut output = [0u8; GROUP_DERIVATION_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| CryptoError::Argon2(e.to_string()))?;
    Ok(output)
}

/// Generate a random 16-byte Argon2id salt.
pub fn generate_salt() -> [u8; 16] {
    crate::csprng::random_16()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_M: u32 = 1024;
    const TEST_T: u32 = 1;
    const TEST_P: u32 = 1;

    #[test]
    fn test_derive_deterministic() {
        let salt = [7u8; 16];
        let a = derive_group_material_custom(b"correct horse", &salt, TEST_M, TEST_T, TEST_P)
            .expect("derive");
        let b = derive_group_material_custom(b"correct horse", &salt, TEST_M, TEST_T, TEST_P)
            .expect("derive");
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_differs_by_passphrase() {
        let salt = [7u8; 16];
        let a = derive_group_material_custom(b"pw1", &salt, TEST_M, TEST_T, TEST_P).expect("derive");
        let b = derive_group_material_custom(b"pw2", &salt, TEST_M, TEST_T, TEST_P).expect("derive");
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_differs_by_salt() {
        let a = derive_group_material_custom(b"pw", &[1u8; 16], TEST_M, TEST_T, TEST_P).expect("derive");
        let b = derive_group_material_custom(b"pw", &[2u8; 16], TEST_M, TEST_T, TEST_P).expect("derive");
        assert_ne!(a, b);
    }

    #[test]
    fn test_passphrase_too_long_rejected() {
        let long = vec![b'a'; MAX_PASSPHRASE_LEN + 1];
        assert!(derive_group_material(&long, &[0u8; 16]).is_err());
    }

    #[test]
    fn test_passphrase_at_boundary_accepted_shape() {
        // Exercise only the length gate; use cheap custom params.
        let exact = vec![b'a'; MAX_PASSPHRASE_LEN];
        let result = derive_group_material_custom(&exact, &[0u8; 16], TEST_M, TEST_T, TEST_P);
        assert!(result.is_ok());
    }

    #[test]
    fn test_generate_salt_varies() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
