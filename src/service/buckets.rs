use chrono::Utc;
use uuid::Uuid;

use super::Service;
use super::validation::validate_bucket_name;
use crate::blob::with_retry;
use crate::error::{Error, Result};
use crate::types::{Action, Bucket, FileRecord};

impl Service {
    pub fn create_bucket(&self, owner_id: &str, name: &str) -> Result<Bucket> {
        validate_bucket_name(name)?;

        let bucket = Bucket {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.store.create_bucket(&bucket)?;

        tracing::info!("Created bucket {} ({}) for {}", bucket.name, bucket.id, owner_id);
        Ok(bucket)
    }

    pub fn rename_bucket(&self, user_id: &str, bucket_id: &str, new_name: &str) -> Result<Bucket> {
        let (mut bucket, _) = self.authorize(user_id, bucket_id, Action::RenameBucket)?;
        validate_bucket_name(new_name)?;

        if bucket.name != new_name {
            self.store.rename_bucket(&bucket.id, new_name)?;
            bucket.name = new_name.to_string();
        }
        Ok(bucket)
    }

    /// Deletes the bucket with all of its files, blobs and grants.
    ///
    /// Blobs are quarantined before the metadata transaction so that a
    /// storage failure leaves the bucket fully intact. Returns the number of
    /// files removed.
    pub async fn delete_bucket(&self, user_id: &str, bucket_id: &str) -> Result<usize> {
        let (bucket, _) = self.authorize(user_id, bucket_id, Action::DeleteBucket)?;
        let files = self.store.list_bucket_files(&bucket.id)?;

        let mut moved: Vec<&str> = Vec::with_capacity(files.len());
        for file in &files {
            match with_retry("quarantine", &file.id, || self.blobs.quarantine(&file.id)).await {
                Ok(true) => moved.push(&file.id),
                Ok(false) => tracing::warn!("File {} has no blob to remove", file.id),
                Err(e) => {
                    tracing::error!(
                        "Aborting delete of bucket {}: could not move blob {}: {}",
                        bucket.id,
                        file.id,
                        e
                    );
                    self.restore_blobs(&moved).await;
                    return Err(e);
                }
            }
        }

        match self.store.delete_bucket(&bucket.id) {
            Ok(true) => {}
            Ok(false) => {
                // Deleted concurrently; its rows are gone, so are these blobs.
                self.purge_blobs(&moved).await;
                return Err(Error::NotFound);
            }
            Err(e) => {
                self.restore_blobs(&moved).await;
                return Err(e);
            }
        }

        self.purge_blobs(&moved).await;

        tracing::info!(
            "Deleted bucket {} ({}) with {} files",
            bucket.name,
            bucket.id,
            files.len()
        );
        Ok(files.len())
    }

    async fn restore_blobs(&self, ids: &[&str]) {
        for id in ids {
            if let Err(e) = with_retry("restore", id, || self.blobs.restore(id)).await {
                tracing::error!("Failed to restore quarantined blob {}: {}", id, e);
            }
        }
    }

    async fn purge_blobs(&self, ids: &[&str]) {
        for id in ids {
            if let Err(e) = with_retry("purge", id, || self.blobs.purge(id)).await {
                tracing::error!("Failed to purge blob {} of deleted bucket: {}", id, e);
            }
        }
    }

    /// Settles blobs left in quarantine by an interrupted bucket delete.
    ///
    /// A blob whose file row still exists is moved back into place; the rest
    /// belong to committed deletes and are purged. Returns the number of
    /// blobs restored.
    pub async fn recover_blobs(&self) -> Result<usize> {
        let mut restored = 0;
        let mut purged = 0;

        for id in self.blobs.quarantined().await? {
            if self.store.get_file(&id)?.is_some() {
                with_retry("restore", &id, || self.blobs.restore(&id)).await?;
                restored += 1;
            } else {
                with_retry("purge", &id, || self.blobs.purge(&id)).await?;
                purged += 1;
            }
        }

        if restored + purged > 0 {
            tracing::info!(
                "Recovered quarantined blobs: {} restored, {} purged",
                restored,
                purged
            );
        }
        Ok(restored)
    }

    pub fn list_files(&self, user_id: &str, bucket_id: &str) -> Result<Vec<FileRecord>> {
        let (bucket, _) = self.authorize(user_id, bucket_id, Action::List)?;
        self.store.list_bucket_files(&bucket.id)
    }

    /// Resolves a bucket name for `user_id`: an owned bucket wins, otherwise
    /// exactly one shared bucket with that name must be visible.
    pub fn resolve_bucket(&self, user_id: &str, name: &str) -> Result<Bucket> {
        if let Some(bucket) = self.store.get_bucket_by_name(user_id, name)? {
            return Ok(bucket);
        }

        let mut shared = Vec::new();
        for grant in self.store.list_user_grants(user_id)? {
            if let Some(bucket) = self.store.get_bucket(&grant.bucket_id)? {
                if bucket.name == name {
                    shared.push(bucket);
                }
            }
        }

        match shared.len() {
            0 => Err(Error::NotFound),
            1 => Ok(shared.remove(0)),
            _ => Err(Error::InvalidInput(format!(
                "Bucket name '{name}' is shared with you by several owners; use bucket_id"
            ))),
        }
    }
}
