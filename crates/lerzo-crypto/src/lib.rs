//! lerzo-crypto: encryption primitives for identity-locked backups
//!
//! ```text
//! identity (email) + random 128-bit salt
//!   └── Argon2id ──► 256-bit backup key (in memory only, zeroized on drop)
//!         └── XChaCha20-Poly1305 (random 192-bit nonce) ──► ciphertext || tag
//! ```
//!
//! There is no access check besides the AEAD tag: a key derived from any
//! other identity fails authentication on decrypt.

pub mod cipher;
pub mod error;
pub mod kdf;

pub use cipher::{decrypt, encrypt, SealedBox};
pub use error::CryptoError;
pub use kdf::{derive_key, derive_key_material, generate_salt, BackupKey, KdfParams};

/// Size of a backup key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the per-backup salt in bytes (128-bit)
pub const SALT_SIZE: usize = 16;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
