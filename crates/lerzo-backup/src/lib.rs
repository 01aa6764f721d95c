//! lerzo-backup: identity-locked encrypted backup and restore
//!
//! Backup: snapshot the data store, derive a key from the signed-in identity
//! and a fresh salt, seal the payload and package it as a `.enc` file.
//!
//! Restore: derive a key from the *current* identity and the file's salt and
//! try to open the payload. A backup made under another identity fails the
//! AEAD check and is reported as access denied; nothing is written to the
//! store unless decryption and payload validation both succeed.

pub mod codec;
pub mod error;
pub mod identity;
pub mod service;
pub mod store;

pub use codec::{pack, unpack, BackupFile, BackupMetadata, BackupPayload, SealedParts};
pub use error::{BackupError, ErrorKind};
pub use identity::{Identity, IdentityProvider, SessionIdentity, DEV_BYPASS_IDENTITY};
pub use service::{
    AppInfo, BackupArtifact, BackupService, BackupState, OperationStatus, RestoreReport,
    RestoreState,
};
pub use store::{DataStore, JsonFileStore, MemoryStore};
