//! Backup payload and `.enc` file format
//!
//! Plaintext payload (JSON, sealed as one unit):
//! ```text
//! { "metadata": { "app", "version", "timestamp", "lockedTo" },
//!   "data": { "students", "enquiries", "payments", "courses", "batches", "schemes" } }
//! ```
//!
//! Backup file (JSON, binary fields base64):
//! ```text
//! { "salt", "iv", "cipherText", "info": "This backup is locked to the user email: <identity>" }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use lerzo_core::Dataset;
use lerzo_crypto::{BackupKey, NONCE_SIZE};
use serde::{Deserialize, Deserializer, Serialize};
use zeroize::Zeroizing;

use crate::error::BackupError;
use crate::identity::Identity;

/// Prefix of the human-readable `info` note in a backup file
pub const INFO_PREFIX: &str = "This backup is locked to the user email: ";

/// Shortest salt Argon2 accepts
const MIN_SALT_LEN: usize = 8;

/// Informational header of a payload.
///
/// `locked_to` is display-only; access is decided by the AEAD tag alone.
/// Absent fields read as empty strings and `timestamp` is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupMetadata {
    pub app: String,
    pub version: String,
    /// ISO-8601 creation time, millisecond precision
    pub timestamp: String,
    pub locked_to: String,
}

impl BackupMetadata {
    pub fn new(app: &str, version: &str, identity: &Identity) -> Self {
        Self {
            app: app.to_string(),
            version: version.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            locked_to: identity.as_str().to_string(),
        }
    }

    /// Creation time, if `timestamp` is RFC 3339.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Metadata never blocks a restore: anything that does not decode is replaced by defaults.
fn lenient_metadata<'de, D>(deserializer: D) -> Result<BackupMetadata, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "ignoring unreadable backup metadata");
        BackupMetadata::default()
    }))
}

/// The plaintext protected by a backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupPayload {
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub metadata: BackupMetadata,
    pub data: Dataset,
}

impl BackupPayload {
    pub fn new(metadata: BackupMetadata, data: Dataset) -> Self {
        Self { metadata, data }
    }

    /// Download name: `<app>_secure_backup_<YYYY-MM-DD>.enc`
    ///
    /// Dated by the metadata timestamp, or today when it is unreadable.
    pub fn file_name(&self) -> String {
        let created = self.metadata.created().unwrap_or_else(Utc::now);
        format!(
            "{}_secure_backup_{}.enc",
            self.metadata.app.to_lowercase(),
            created.format("%Y-%m-%d")
        )
    }

    fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, BackupError> {
        serde_json::to_vec(self)
            .map(Zeroizing::new)
            .map_err(|e| BackupError::Internal(format!("payload serialization: {e}")))
    }

    fn from_bytes(data: &[u8]) -> Result<Self, BackupError> {
        serde_json::from_slice(data).map_err(|e| BackupError::CorruptPayload(e.to_string()))
    }
}

/// The on-disk backup artifact.
///
/// Every field is optional on input so that an incomplete file can be
/// reported as malformed instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

/// Decoded binary fields of a validated [`BackupFile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedParts {
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
    pub cipher_text: Vec<u8>,
}

impl BackupFile {
    /// Parse a backup file. Anything that is not a JSON object of string fields is malformed.
    pub fn from_json(data: &[u8]) -> Result<Self, BackupError> {
        serde_json::from_slice(data)
            .map_err(|e| BackupError::MalformedFile(format!("file is not a valid backup: {e}")))
    }

    pub fn to_json(&self) -> Result<String, BackupError> {
        serde_json::to_string(self)
            .map_err(|e| BackupError::Internal(format!("backup file serialization: {e}")))
    }

    /// Identity named in the `info` note, if the note has the standard form.
    pub fn locked_to(&self) -> Option<&str> {
        self.info.as_deref()?.strip_prefix(INFO_PREFIX)
    }

    /// Check that salt, iv and cipherText are all present and decode them.
    ///
    /// Runs before any key derivation or decryption.
    pub fn open(&self) -> Result<SealedParts, BackupError> {
        let missing: Vec<&str> = [
            ("salt", &self.salt),
            ("iv", &self.iv),
            ("cipherText", &self.cipher_text),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(BackupError::MalformedFile(format!(
                "missing security fields: {}",
                missing.join(", ")
            )));
        }

        let salt = decode_field("salt", self.salt.as_deref())?;
        let iv = decode_field("iv", self.iv.as_deref())?;
        let cipher_text = decode_field("cipherText", self.cipher_text.as_deref())?;

        if salt.len() < MIN_SALT_LEN {
            return Err(BackupError::MalformedFile(format!(
                "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
                salt.len()
            )));
        }
        if iv.len() != NONCE_SIZE {
            return Err(BackupError::MalformedFile(format!(
                "iv must be {NONCE_SIZE} bytes, got {}",
                iv.len()
            )));
        }

        Ok(SealedParts {
            salt,
            iv,
            cipher_text,
        })
    }
}

fn decode_field(name: &str, value: Option<&str>) -> Result<Vec<u8>, BackupError> {
    STANDARD
        .decode(value.unwrap_or_default())
        .map_err(|e| BackupError::MalformedFile(format!("{name} is not valid base64: {e}")))
}

/// Serialize and seal `payload` under `key`, packaging it with `salt`.
///
/// `key` must have been derived from `salt`; the salt is stored so the key
/// can be derived again on restore.
pub fn pack(payload: &BackupPayload, key: &BackupKey, salt: &[u8]) -> Result<BackupFile, BackupError> {
    let plaintext = payload.to_bytes()?;
    let sealed = lerzo_crypto::encrypt(key, &plaintext)?;

    Ok(BackupFile {
        salt: Some(STANDARD.encode(salt)),
        iv: Some(STANDARD.encode(sealed.iv)),
        cipher_text: Some(STANDARD.encode(&sealed.cipher_text)),
        info: Some(format!("{INFO_PREFIX}{}", payload.metadata.locked_to)),
    })
}

/// Open `file` with `key` and decode the payload.
///
/// - missing or undecodable salt/iv/cipherText: [`BackupError::MalformedFile`]
/// - tag mismatch (wrong identity or tampering): [`BackupError::AccessDenied`]
/// - decrypted bytes without a valid `data` object: [`BackupError::CorruptPayload`]
pub fn unpack(file: &BackupFile, key: &BackupKey) -> Result<BackupPayload, BackupError> {
    let parts = file.open()?;
    let plaintext = lerzo_crypto::decrypt(key, &parts.iv, &parts.cipher_text)?;
    BackupPayload::from_bytes(&plaintext)
}
