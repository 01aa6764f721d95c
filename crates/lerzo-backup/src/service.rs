//! Backup/restore orchestration
//!
//! Backup:  Idle → Collecting → Encrypting → Ready | Failed
//! Restore: Idle → Validating → Decrypting → Applying → Done | Failed
//!
//! Key derivation, sealing, and store I/O run on the blocking pool. The store
//! is only written in `Applying`, which is reached only after the payload has
//! decrypted and decoded.

use lerzo_core::config::AppConfig;
use lerzo_core::{Collection, Dataset};
use std::sync::Arc;
use lerzo_crypto::{derive_key, generate_salt, KdfParams};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::codec::{self, BackupFile, BackupMetadata, BackupPayload};
use crate::error::{BackupError, ErrorKind};
use crate::identity::IdentityProvider;
use crate::store::DataStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    Collecting,
    Encrypting,
    Ready,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Validating,
    Decrypting,
    Applying,
    Done,
    Failed(ErrorKind),
}

/// Latest state of the most recent operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Idle,
    Backup(BackupState),
    Restore(RestoreState),
}

/// Application name and version stamped into backup metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

impl From<&AppConfig> for AppInfo {
    fn from(config: &AppConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
        }
    }
}

/// A finished backup, ready to be written out.
#[derive(Debug, Clone)]
pub struct BackupArtifact {
    pub file_name: String,
    pub file: BackupFile,
    pub records: usize,
}

/// What a successful restore applied
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub metadata: BackupMetadata,
    pub counts: Vec<(Collection, usize)>,
}

impl RestoreReport {
    pub fn records(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

pub struct BackupService<S> {
    store: Arc<S>,
    app: AppInfo,
    kdf: KdfParams,
    status: watch::Sender<OperationStatus>,
}

impl<S> BackupService<S>
where
    S: DataStore + Send + Sync + 'static,
{
    pub fn new(store: S, app: AppInfo) -> Self {
        let (status, _) = watch::channel(OperationStatus::Idle);
        Self {
            store: Arc::new(store),
            app,
            kdf: KdfParams::default(),
            status,
        }
    }

    pub fn with_kdf_params(mut self, params: KdfParams) -> Self {
        self.kdf = params;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn status(&self) -> OperationStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationStatus> {
        self.status.subscribe()
    }

    fn publish(&self, status: OperationStatus) {
        tracing::debug!(?status, "backup service state");
        self.status.send_replace(status);
    }

    async fn snapshot(&self) -> Result<Dataset, BackupError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.snapshot())
            .await
            .map_err(|e| BackupError::Internal(format!("store read task failed: {e}")))?
            .map_err(BackupError::StoreReadFailure)
    }

    async fn replace_all(&self, data: Dataset) -> Result<(), BackupError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.replace_all(data))
            .await
            .map_err(|e| BackupError::Internal(format!("store write task failed: {e}")))?
            .map_err(BackupError::StoreWriteFailure)
    }

    /// Snapshot the store and seal it to the provider's current identity.
    pub async fn backup<P>(&self, identity: &P) -> Result<BackupArtifact, BackupError>
    where
        P: IdentityProvider + ?Sized,
    {
        let result = self.run_backup(identity).await;
        match &result {
            Ok(artifact) => {
                self.publish(OperationStatus::Backup(BackupState::Ready));
                info!(
                    file = %artifact.file_name,
                    records = artifact.records,
                    "secure backup created"
                );
            }
            Err(e) => {
                self.publish(OperationStatus::Backup(BackupState::Failed(e.kind())));
                warn!(kind = ?e.kind(), error = %e, "backup failed");
            }
        }
        result
    }

    async fn run_backup<P>(&self, identity: &P) -> Result<BackupArtifact, BackupError>
    where
        P: IdentityProvider + ?Sized,
    {
        let identity = identity
            .current_identity()
            .ok_or(BackupError::IdentityUnavailable)?;

        self.publish(OperationStatus::Backup(BackupState::Collecting));
        let data = self.snapshot().await?;

        let metadata = BackupMetadata::new(&self.app.name, &self.app.version, &identity);
        let payload = BackupPayload::new(metadata, data);
        let file_name = payload.file_name();
        let records = payload.data.len();

        self.publish(OperationStatus::Backup(BackupState::Encrypting));
        let params = self.kdf.clone();
        let file = tokio::task::spawn_blocking(move || -> Result<BackupFile, BackupError> {
            let salt = generate_salt();
            let key = derive_key(identity.as_str(), &salt, &params)?;
            codec::pack(&payload, &key, &salt)
        })
        .await
        .map_err(|e| BackupError::Internal(format!("encryption task failed: {e}")))??;

        Ok(BackupArtifact {
            file_name,
            file,
            records,
        })
    }

    /// Parse raw backup file contents and restore them.
    ///
    /// A missing identity is reported before the contents are looked at.
    pub async fn restore_bytes<P>(
        &self,
        identity: &P,
        contents: &[u8],
    ) -> Result<RestoreReport, BackupError>
    where
        P: IdentityProvider + ?Sized,
    {
        self.publish(OperationStatus::Restore(RestoreState::Validating));
        if identity.current_identity().is_none() {
            return Err(self.restore_failed(BackupError::IdentityUnavailable));
        }
        let file = if contents.is_empty() {
            Err(BackupError::MalformedFile("no backup file supplied".into()))
        } else {
            BackupFile::from_json(contents)
        };
        match file {
            Ok(file) => self.restore(identity, &file).await,
            Err(e) => Err(self.restore_failed(e)),
        }
    }

    /// Open `file` with the provider's current identity and replace the store contents.
    pub async fn restore<P>(
        &self,
        identity: &P,
        file: &BackupFile,
    ) -> Result<RestoreReport, BackupError>
    where
        P: IdentityProvider + ?Sized,
    {
        match self.run_restore(identity, file).await {
            Ok(report) => {
                self.publish(OperationStatus::Restore(RestoreState::Done));
                info!(
                    records = report.records(),
                    created = %report.metadata.timestamp,
                    "backup restored"
                );
                Ok(report)
            }
            Err(e) => Err(self.restore_failed(e)),
        }
    }

    fn restore_failed(&self, err: BackupError) -> BackupError {
        self.publish(OperationStatus::Restore(RestoreState::Failed(err.kind())));
        warn!(kind = ?err.kind(), error = %err, "restore failed");
        err
    }

    async fn run_restore<P>(
        &self,
        identity: &P,
        file: &BackupFile,
    ) -> Result<RestoreReport, BackupError>
    where
        P: IdentityProvider + ?Sized,
    {
        self.publish(OperationStatus::Restore(RestoreState::Validating));
        let identity = identity
            .current_identity()
            .ok_or(BackupError::IdentityUnavailable)?;
        let parts = file.open()?;

        self.publish(OperationStatus::Restore(RestoreState::Decrypting));
        let params = self.kdf.clone();
        let file = file.clone();
        let payload = tokio::task::spawn_blocking(move || -> Result<BackupPayload, BackupError> {
            let key = derive_key(identity.as_str(), &parts.salt, &params)?;
            codec::unpack(&file, &key)
        })
        .await
        .map_err(|e| BackupError::Internal(format!("decryption task failed: {e}")))??;

        self.publish(OperationStatus::Restore(RestoreState::Applying));
        let counts: Vec<_> = payload.data.counts().collect();
        self.replace_all(payload.data).await?;

        Ok(RestoreReport {
            metadata: payload.metadata,
            counts,
        })
    }
}
