//! Key derivation: Argon2id (identity, salt) → backup key

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;
use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit key derived from an identity and a backup salt.
///
/// Lives only for one encrypt or decrypt call. Zeroized on drop.
#[derive(Clone)]
pub struct BackupKey {
    bytes: [u8; KEY_SIZE],
}

impl BackupKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for BackupKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for BackupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id parameters for KDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl KdfParams {
    pub fn new(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            mem_cost_kib,
            time_cost,
            parallelism,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Generate a fresh random salt for one backup.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive `length` bytes of key material from an identity and salt with Argon2id.
///
/// Deterministic: the same identity, salt, params and length always give the
/// same bytes. Argon2 rejects salts shorter than 8 bytes.
pub fn derive_key_material(
    identity: &str,
    salt: &[u8],
    params: &KdfParams,
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if identity.is_empty() {
        return Err(CryptoError::InvalidInput("identity must not be empty".into()));
    }

    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(length),
    )
    .map_err(|e| CryptoError::InvalidInput(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut output = Zeroizing::new(vec![0u8; length]);
    argon2
        .hash_password_into(identity.as_bytes(), salt, &mut output)
        .map_err(|e| CryptoError::InvalidInput(format!("Argon2id KDF rejected input: {e}")))?;

    Ok(output)
}

/// Derive a 256-bit backup key from an identity and salt.
pub fn derive_key(
    identity: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<BackupKey, CryptoError> {
    let material = derive_key_material(identity, salt, params, KEY_SIZE)?;

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&material);
    tracing::debug!(salt_len = salt.len(), "derived backup key");

    Ok(BackupKey::from_bytes(bytes))
}
