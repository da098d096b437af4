//! Filesystem blob store for snapshots.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use alexandria_core::{BlobStore, Error, Result};

/// Stores each blob as a flat file under a base directory.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a blob name, or a location returned by `save`, to its file.
    ///
    /// A location is accepted only when its parent is exactly the base
    /// directory, so it never reaches outside the store.
    fn resolve(&self, location: &str) -> Result<PathBuf> {
        let path = Path::new(location);
        if path.parent() == Some(self.base_path.as_path()) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                return self.full_path(name);
            }
        }
        self.full_path(location)
    }

    fn full_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(Error::InvalidInput(format!("Invalid blob name: {:?}", name)));
        }
        Ok(self.base_path.join(name))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn save(&self, name: &str, data: Vec<u8>) -> Result<String> {
        let full_path = self.full_path(name)?;
        debug!(
            subsystem = "storage",
            component = "blob",
            op = "save",
            blob = %name,
            size = data.len(),
            "Writing blob"
        );

        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            warn!(base_path = %self.base_path.display(), error = %e, "blob: create_dir_all failed");
            Error::Storage(format!("create {}: {}", self.base_path.display(), e))
        })?;

        // Temp file + rename so readers never see a partial snapshot.
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Storage(format!("create {}: {}", temp_path.display(), e)))?;
        file.write_all(&data)
            .await
            .map_err(|e| Error::Storage(format!("write {}: {}", temp_path.display(), e)))?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "blob: rename failed");
            Error::Storage(format!("rename to {}: {}", full_path.display(), e))
        })?;

        Ok(full_path.display().to_string())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(name)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Snapshot '{}' not found", name)))
            }
            Err(e) => Err(Error::Storage(format!("read {}: {}", full_path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_then_read() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        let location = store
            .save("backup-20240101T000000.000Z.json", b"{}".to_vec())
            .await
            .unwrap();

        assert!(location.ends_with("backup-20240101T000000.000Z.json"));
        let data = store.read("backup-20240101T000000.000Z.json").await.unwrap();
        assert_eq!(data, b"{}");
    }

    #[tokio::test]
    async fn test_save_creates_base_directory() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("nested/backups"));

        store.save("a.json", b"x".to_vec()).await.unwrap();
        assert!(dir.path().join("nested/backups/a.json").exists());
        assert!(!dir.path().join("nested/backups/a.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        let err = store.read("missing.json").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        for name in ["../etc/passwd", "a/b.json", "", ".hidden"] {
            let err = store.save(name, Vec::new()).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{:?}", name);
        }
    }

    #[tokio::test]
    async fn test_read_accepts_saved_location() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        let location = store.save("c.json", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.read(&location).await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_read_rejects_location_outside_base() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("backups"));
        store.save("c.json", b"{}".to_vec()).await.unwrap();

        let nested = dir.path().join("backups/sub/c.json");
        let sibling = dir.path().join("c.json");
        for location in [nested, sibling] {
            let err = store.read(&location.display().to_string()).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{:?}", location);
        }
    }

    #[tokio::test]
    async fn test_save_overwrites_same_name() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path());

        store.save("b.json", b"one".to_vec()).await.unwrap();
        store.save("b.json", b"two".to_vec()).await.unwrap();
        assert_eq!(store.read("b.json").await.unwrap(), b"two");
    }
}
