//! Data store seam: full snapshot in, bulk replace out

use anyhow::{Context, Result};
use lerzo_core::Dataset;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// The document store that owns the six entity collections.
pub trait DataStore {
    /// Read every collection as one consistent snapshot.
    fn snapshot(&self) -> Result<Dataset>;

    /// Overwrite every collection with `dataset`.
    ///
    /// Either the whole dataset is committed or an error is returned.
    fn replace_all(&self, dataset: Dataset) -> Result<()>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Dataset>,
}

impl MemoryStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            inner: RwLock::new(dataset),
        }
    }
}

impl DataStore for MemoryStore {
    fn snapshot(&self) -> Result<Dataset> {
        let guard = self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(guard.clone())
    }

    fn replace_all(&self, dataset: Dataset) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        *guard = dataset;
        Ok(())
    }
}

/// Dataset kept in a single JSON file.
///
/// A missing file reads as an empty dataset. Writes go to a temporary file in
/// the same directory which is then renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataStore for JsonFileStore {
    fn snapshot(&self) -> Result<Dataset> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "data file absent, empty snapshot");
            return Ok(Dataset::default());
        }

        let content = std::fs::read(&self.path)
            .with_context(|| format!("reading data file: {}", self.path.display()))?;
        serde_json::from_slice(&content)
            .with_context(|| format!("parsing data file: {}", self.path.display()))
    }

    fn replace_all(&self, dataset: Dataset) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating data directory: {}", dir.display()))?;

        let json = serde_json::to_vec_pretty(&dataset).context("serializing dataset")?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        tmp.write_all(&json).context("writing dataset")?;
        tmp.as_file().sync_all().context("syncing dataset")?;
        tmp.persist(&self.path)
            .with_context(|| format!("replacing data file: {}", self.path.display()))?;

        tracing::debug!(
            path = %self.path.display(),
            records = dataset.len(),
            "data file replaced"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lerzo_core::Record;

    fn sample() -> Dataset {
        Dataset {
            students: vec![Record::new("s1").with_field("name", "Asha")],
            courses: vec![Record::new("c1").with_field("fees", 12000)],
            ..Dataset::default()
        }
    }

    #[test]
    fn test_memory_store_replace() {
        let store = MemoryStore::new(sample());
        assert_eq!(store.snapshot().unwrap().len(), 2);

        store.replace_all(Dataset::default()).unwrap();
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_missing_file_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path().join("data.json"));
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path().join("nested/dir/data.json"));

        store.replace_all(sample()).unwrap();
        assert_eq!(store.snapshot().unwrap(), sample());
    }

    #[test]
    fn test_json_store_replace_overwrites() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path().join("data.json"));

        store.replace_all(sample()).unwrap();
        let replacement = Dataset {
            schemes: vec![Record::new("x1").with_field("discountPercent", 10)],
            ..Dataset::default()
        };
        store.replace_all(replacement.clone()).unwrap();

        assert_eq!(store.snapshot().unwrap(), replacement);
    }

    #[test]
    fn test_json_store_corrupt_file_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = JsonFileStore::new(&path).snapshot().unwrap_err();
        assert!(format!("{err:#}").contains("parsing data file"));
    }
}
