use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LerzoError, LerzoResult};

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LerzoConfig {
    pub app: AppConfig,
    pub identity: IdentityConfig,
    pub store: StoreConfig,
    pub backup: BackupConfig,
    pub crypto: CryptoConfig,
}

/// Application identity written into backup metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name (metadata `app`, lowercased as the backup file prefix)
    pub name: String,
    /// Application version (metadata `version`)
    pub version: String,
}

/// Session identity used to lock and unlock backups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Email of the signed-in user
    pub email: Option<String>,
    /// Fall back to the developer-bypass identity when no email is set
    pub dev_bypass: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON dataset file backing the local data store
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory new backup files are written to
    pub output_dir: PathBuf,
}

/// Argon2id cost parameters.
///
/// These are not recorded in the backup file, so a restore only succeeds
/// with the same values that were used to create the backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Lerzo".into(),
            version: "1.0".into(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/lerzo/data.json"),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl LerzoConfig {
    /// Parse a TOML document; missing sections and keys take their defaults.
    pub fn from_toml_str(content: &str) -> LerzoResult<Self> {
        toml::from_str(content).map_err(|e| LerzoError::Config(e.to_string()))
    }

    /// Load the config file at `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> LerzoResult<Self> {
        let path = expand_tilde(path);
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| LerzoError::Config(format!("parsing {}: {e}", path.display())))
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// Expand a leading `~/` to `$HOME`.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_prefix("~/")) {
        Some(rest) => home_dir().join(rest),
        None => path.to_path_buf(),
    }
}
