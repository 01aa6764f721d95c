//! XChaCha20-Poly1305 sealing of a whole backup payload
//!
//! The nonce is returned separately from the ciphertext so it can be stored
//! in its own field of the backup file:
//! ```text
//! iv          = [24 bytes: random nonce]
//! cipher_text = [N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::kdf::BackupKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Output of [`encrypt`]: the nonce and the tagged ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub iv: [u8; NONCE_SIZE],
    pub cipher_text: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a freshly generated nonce.
pub fn encrypt(key: &BackupKey, plaintext: &[u8]) -> Result<SealedBox, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut iv = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = XNonce::from_slice(&iv);

    let cipher_text = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(SealedBox { iv, cipher_text })
}

/// Decrypt and verify `cipher_text` under `key`.
///
/// Any tag mismatch, including one caused by a key derived from a different
/// identity, is [`CryptoError::AuthenticationFailure`]. No plaintext is
/// returned unless the whole ciphertext verifies.
pub fn decrypt(
    key: &BackupKey,
    iv: &[u8],
    cipher_text: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if iv.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidInput(format!(
            "nonce must be {NONCE_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    if cipher_text.len() < TAG_SIZE {
        return Err(CryptoError::AuthenticationFailure);
    }

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = XNonce::from_slice(iv);

    cipher
        .decrypt(nonce, cipher_text)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;
    use proptest::prelude::*;

    fn key(byte: u8) -> BackupKey {
        BackupKey::from_bytes([byte; KEY_SIZE])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let sealed = encrypt(&key(7), b"students, fees, batches").unwrap();
        let plaintext = decrypt(&key(7), &sealed.iv, &sealed.cipher_text).unwrap();

        assert_eq!(&plaintext[..], b"students, fees, batches");
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let sealed = encrypt(&key(7), b"").unwrap();
        let plaintext = decrypt(&key(7), &sealed.iv, &sealed.cipher_text).unwrap();

        assert!(plaintext.is_empty());
    }

    #[test]
    fn test_ciphertext_size() {
        let sealed = encrypt(&key(1), &[0u8; 1000]).unwrap();
        // plaintext (1000) + tag (16)
        assert_eq!(sealed.cipher_text.len(), 1000 + TAG_SIZE);
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let a = encrypt(&key(1), b"same plaintext").unwrap();
        let b = encrypt(&key(1), b"same plaintext").unwrap();

        assert_ne!(a.iv, b.iv, "nonces must not repeat");
        assert_ne!(a.cipher_text, b.cipher_text);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let sealed = encrypt(&key(1), b"secret data").unwrap();
        let result = decrypt(&key(2), &sealed.iv, &sealed.cipher_text);

        assert!(matches!(result, Err(CryptoError::AuthenticationFailure)));
    }

    #[test]
    fn test_decrypt_wrong_nonce() {
        let sealed = encrypt(&key(1), b"secret data").unwrap();
        let mut iv = sealed.iv;
        iv[0] ^= 0x01;

        let result = decrypt(&key(1), &iv, &sealed.cipher_text);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailure)));
    }

    #[test]
    fn test_decrypt_bad_nonce_length() {
        let sealed = encrypt(&key(1), b"secret data").unwrap();
        let result = decrypt(&key(1), &sealed.iv[..12], &sealed.cipher_text);

        assert!(matches!(result, Err(CryptoError::InvalidInput(_))));
    }

    #[test]
    fn test_decrypt_truncated() {
        let sealed = encrypt(&key(1), b"secret data").unwrap();
        let result = decrypt(&key(1), &sealed.iv, &sealed.cipher_text[..4]);

        assert!(matches!(result, Err(CryptoError::AuthenticationFailure)));
    }

    proptest! {
        #[test]
        fn any_flipped_byte_fails_authentication(
            data in proptest::collection::vec(any::<u8>(), 1..256),
            pos in any::<prop::sample::Index>(),
            mask in 1u8..=255,
        ) {
            let sealed = encrypt(&key(9), &data).unwrap();
            let mut tampered = sealed.cipher_text.clone();
            let i = pos.index(tampered.len());
            tampered[i] ^= mask;

            let result = decrypt(&key(9), &sealed.iv, &tampered);
            prop_assert!(matches!(result, Err(CryptoError::AuthenticationFailure)));
        }
    }
}
