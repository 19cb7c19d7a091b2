//! [`GroupDescriptor`]: the derived material for one group, plus the two
//! entry points (`create_group`, `join_group`) that produce it from a
//! passphrase.

use fluxon_types::GroupId;
use zeroize::Zeroize;

use crate::Result;

/// A group's derived key material. The passphrase itself is never stored —
/// only what Argon2id produced from it.
pub struct GroupDescriptor {
    pub group_id: GroupId,
    group_key: [u8; 32],
    pub salt: [u8; 16],
}

impl GroupDescriptor {
    pub fn group_key(&self) -> &[u8; 32] {
        &self.group_key
    }
}

impl Drop for GroupDescriptor {
    fn drop(&mut self) {
        self.group_key.zeroize();
    }
}

/// Create a new group from a freshly generated random salt.
pub fn create_group(passphrase: &[u8]) -> Result<GroupDescriptor> {
    let salt = fluxon_crypto::argon2id::generate_salt();
    from_passphrase_and_salt(passphrase, salt)
}

/// Join an existing group given its passphrase and the salt recovered from
/// its join code.
pub fn join_group(passphrase: &[u8], salt: [u8; 16]) -> Result<GroupDescriptor> {
    from_passphrase_and_salt(passphrase, salt)
}

fn from_passphrase_and_salt(passphrase: &[u8], salt: [u8; 16]) -> Result<GroupDescriptor> {
    let material = fluxon_crypto::argon2id::derive_group_material(passphrase, &salt)?;
    let mut group_key = [0u8; 32];
    group_key.copy_from_slice(&material[..32]);

    let group_id_bytes = fluxon_crypto::blake2b::group_id(&group_key, &salt);
    Ok(GroupDescriptor {
        group_id: GroupId::from_bytes(group_id_bytes),
        group_key,
        salt,
    })
}
