use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The AEAD tag did not verify: wrong key or modified ciphertext.
    #[error("authentication failed: wrong key or corrupted ciphertext")]
    AuthenticationFailure,
}
