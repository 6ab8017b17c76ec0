use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

use super::{BlobReader, BlobStore};
use crate::error::{Error, Result};

fn from_io(e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::NotFound
    } else {
        Error::StorageIo(e)
    }
}

/// Filesystem blob store rooted at `<data_dir>/blobs`.
///
/// Live payloads sit under `objects/<ab>/<cd>/<id>`; writes go through
/// `tmp/` and are renamed into place, and bucket deletion parks payloads in
/// `quarantine/` until the metadata transaction has committed.
pub struct FsBlobStore {
    base_path: PathBuf,
}

impl FsBlobStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_path: data_dir.join("blobs"),
        }
    }

    fn object_path(&self, id: &str) -> PathBuf {
        self.base_path
            .join("objects")
            .join(&id[0..2])
            .join(&id[2..4])
            .join(id)
    }

    fn quarantine_path(&self, id: &str) -> PathBuf {
        self.base_path.join("quarantine").join(id)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join("tmp")
            .join(Uuid::new_v4().to_string())
    }
}

async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::rename(from, to).await
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, id: &str, data: &[u8]) -> Result<()> {
        validate_id(id)?;

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp_file = File::create(&temp_path).await?;
        let written = async {
            temp_file.write_all(data).await?;
            temp_file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::StorageIo(e));
        }

        if let Err(e) = move_file(&temp_path, &self.object_path(id)).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::StorageIo(e));
        }

        Ok(())
    }

    async fn open(&self, id: &str) -> Result<(BlobReader, u64)> {
        validate_id(id)?;
        let file = File::open(self.object_path(id)).await.map_err(from_io)?;
        let size = file.metadata().await?.len();

        Ok((Box::new(BufReader::new(file)), size))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        Ok(fs::try_exists(self.object_path(id)).await?)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        validate_id(id)?;

        match fs::remove_file(self.object_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::StorageIo(e)),
        }
    }

    async fn quarantine(&self, id: &str) -> Result<bool> {
        validate_id(id)?;

        match move_file(&self.object_path(id), &self.quarantine_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::StorageIo(e)),
        }
    }

    async fn restore(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        move_file(&self.quarantine_path(id), &self.object_path(id))
            .await
            .map_err(from_io)
    }

    async fn purge(&self, id: &str) -> Result<()> {
        validate_id(id)?;

        match fs::remove_file(self.quarantine_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StorageIo(e)),
        }
    }

    async fn quarantined(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(self.base_path.join("quarantine")).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::StorageIo(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if validate_id(name).is_ok() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Ids become path components, so only `[A-Za-z0-9-]` is accepted.
fn validate_id(id: &str) -> Result<()> {
    if id.len() < 4 || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(Error::InvalidInput(format!("invalid blob id: {id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    const ID: &str = "5f0c2a8e-2d1b-4c52-9d8e-0a4f7f3b1c11";

    async fn read_all(store: &FsBlobStore, id: &str) -> Vec<u8> {
        let (mut reader, _) = store.open(id).await.unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        content
    }

    #[tokio::test]
    async fn test_put_and_open() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        store.put(ID, b"hello").await.unwrap();

        assert!(store.exists(ID).await.unwrap());
        let (_, size) = store.open(ID).await.unwrap();
        assert_eq!(size, 5);
        assert_eq!(read_all(&store, ID).await, b"hello");

        let leftovers = std::fs::read_dir(temp_dir.path().join("blobs/tmp"))
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_open_missing() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        assert!(!store.exists(ID).await.unwrap());
        assert!(matches!(store.open(ID).await, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn test_invalid_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        assert!(matches!(
            store.put("../../etc/passwd", b"x").await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(store.exists("ab").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        store.put(ID, b"data").await.unwrap();
        assert!(store.delete(ID).await.unwrap());
        assert!(!store.exists(ID).await.unwrap());
        assert!(!store.delete(ID).await.unwrap());
    }

    #[tokio::test]
    async fn test_quarantine_restore_and_purge() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        store.put(ID, b"data").await.unwrap();

        assert!(store.quarantine(ID).await.unwrap());
        assert!(!store.exists(ID).await.unwrap());

        store.restore(ID).await.unwrap();
        assert_eq!(read_all(&store, ID).await, b"data");

        assert!(store.quarantine(ID).await.unwrap());
        store.purge(ID).await.unwrap();
        assert!(!store.exists(ID).await.unwrap());
        assert!(matches!(store.restore(ID).await, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn test_quarantine_missing_blob() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        assert!(!store.quarantine(ID).await.unwrap());
        store.purge(ID).await.unwrap();
    }

    #[tokio::test]
    async fn test_quarantined_lists_parked_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());
        assert!(store.quarantined().await.unwrap().is_empty());

        let other = "0a1b2c3d-0000-4000-8000-000000000001";
        store.put(ID, b"one").await.unwrap();
        store.put(other, b"two").await.unwrap();
        store.quarantine(ID).await.unwrap();

        assert_eq!(store.quarantined().await.unwrap(), vec![ID.to_string()]);

        store.quarantine(other).await.unwrap();
        assert_eq!(
            store.quarantined().await.unwrap(),
            vec![other.to_string(), ID.to_string()]
        );

        store.purge(ID).await.unwrap();
        store.restore(other).await.unwrap();
        assert!(store.quarantined().await.unwrap().is_empty());
    }
}
