use lerzo_crypto::CryptoError;
use thiserror::Error;

/// Failure category of a backup or restore, as published in the service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    IdentityUnavailable,
    MalformedFile,
    AccessDenied,
    CorruptPayload,
    StoreReadFailure,
    StoreWriteFailure,
    Crypto,
    Internal,
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("no signed-in identity: log in to create or restore a secure backup")]
    IdentityUnavailable,

    #[error("invalid backup file: {0}")]
    MalformedFile(String),

    /// The payload did not authenticate under the current identity's key.
    ///
    /// A modified file fails the same way; the two cases cannot be told apart.
    #[error("access denied: this backup belongs to a different user/email")]
    AccessDenied,

    #[error("decrypted backup data is corrupted: {0}")]
    CorruptPayload(String),

    #[error("reading data store snapshot failed: {0:#}")]
    StoreReadFailure(anyhow::Error),

    #[error("data store rejected the restore: {0:#}")]
    StoreWriteFailure(anyhow::Error),

    #[error(transparent)]
    Crypto(CryptoError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BackupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackupError::IdentityUnavailable => ErrorKind::IdentityUnavailable,
            BackupError::MalformedFile(_) => ErrorKind::MalformedFile,
            BackupError::AccessDenied => ErrorKind::AccessDenied,
            BackupError::CorruptPayload(_) => ErrorKind::CorruptPayload,
            BackupError::StoreReadFailure(_) => ErrorKind::StoreReadFailure,
            BackupError::StoreWriteFailure(_) => ErrorKind::StoreWriteFailure,
            BackupError::Crypto(_) => ErrorKind::Crypto,
            BackupError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<CryptoError> for BackupError {
    /// Tag failures become [`BackupError::AccessDenied`]; everything else stays a crypto error.
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailure => BackupError::AccessDenied,
            other => BackupError::Crypto(other),
        }
    }
}
