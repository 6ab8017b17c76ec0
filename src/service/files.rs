use chrono::Utc;
use uuid::Uuid;

use super::Service;
use super::validation::validate_file_name;
use crate::blob::{BlobReader, checksum, with_retry};
use crate::error::{Error, Result};
use crate::types::{Action, Bucket, FileRecord, extension};

const OCTET_STREAM: &str = "application/octet-stream";

/// A file ready to be streamed to the client.
pub struct Download {
    pub file: FileRecord,
    pub size: u64,
    pub reader: BlobReader,
}

impl Service {
    /// Stores `data` as `name` in the bucket. The blob is written before the
    /// metadata row, and removed again if the row cannot be inserted.
    pub async fn upload_file(
        &self,
        user_id: &str,
        bucket_id: &str,
        name: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<FileRecord> {
        let (bucket, _) = self.authorize(user_id, bucket_id, Action::Upload)?;
        self.validate_upload(name, data.len() as u64)?;

        let file = FileRecord {
            id: Uuid::new_v4().to_string(),
            bucket_id: bucket.id.clone(),
            name: name.to_string(),
            size_bytes: data.len() as i64,
            content_type: content_type_for(name, content_type),
            checksum: checksum(data),
            uploaded_at: Utc::now(),
            uploaded_by: user_id.to_string(),
        };

        with_retry("put", &file.id, || self.blobs.put(&file.id, data)).await?;

        if let Err(e) = self.store.create_file(&file) {
            if let Err(cleanup) = self.blobs.delete(&file.id).await {
                tracing::error!("Failed to remove blob {} after rejected upload: {}", file.id, cleanup);
            }
            return Err(e);
        }

        tracing::info!(
            "Uploaded {} ({} bytes) to bucket {}",
            file.name,
            file.size_bytes,
            bucket.id
        );
        Ok(file)
    }

    fn validate_upload(&self, name: &str, size: u64) -> Result<()> {
        validate_file_name(name)?;
        if self.limits.is_blocked(name) {
            return Err(Error::InvalidInput(
                "This file type is not allowed for security reasons".into(),
            ));
        }
        if size > self.limits.max_file_size {
            return Err(Error::PayloadTooLarge(self.limits.max_file_size));
        }
        Ok(())
    }

    pub async fn download_file(&self, user_id: &str, file_id: &str) -> Result<Download> {
        let (file, _) = self.authorize_file(user_id, file_id, Action::Download)?;

        let (reader, size) = with_retry("open", &file.id, || self.blobs.open(&file.id))
            .await
            .inspect_err(|e| {
                if matches!(e, Error::NotFound) {
                    tracing::warn!("File {} has metadata but no blob", file.id);
                }
            })?;

        Ok(Download { file, size, reader })
    }

    /// Removes the metadata row, then the blob. A blob left behind is only logged.
    pub async fn delete_file(&self, user_id: &str, file_id: &str) -> Result<FileRecord> {
        let (file, _) = self.authorize_file(user_id, file_id, Action::DeleteFile)?;

        if !self.store.delete_file(&file.id)? {
            return Err(Error::NotFound);
        }

        match with_retry("delete", &file.id, || self.blobs.delete(&file.id)).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Deleted file {} had no blob", file.id),
            Err(e) => tracing::error!("Failed to delete blob {}: {}", file.id, e),
        }

        tracing::info!("Deleted file {} from bucket {}", file.name, file.bucket_id);
        Ok(file)
    }

    pub fn rename_file(&self, user_id: &str, file_id: &str, new_name: &str) -> Result<FileRecord> {
        let (mut file, _) = self.authorize_file(user_id, file_id, Action::RenameFile)?;
        validate_file_name(new_name)?;
        if self.limits.is_blocked(new_name) {
            return Err(Error::InvalidInput(
                "This file type is not allowed for security reasons".into(),
            ));
        }

        if file.name != new_name {
            self.store.rename_file(&file.id, new_name)?;
            file.name = new_name.to_string();
        }
        Ok(file)
    }

    fn authorize_file(
        &self,
        user_id: &str,
        file_id: &str,
        action: Action,
    ) -> Result<(FileRecord, Bucket)> {
        let file = self.store.get_file(file_id)?.ok_or(Error::NotFound)?;
        let (bucket, _) = self.authorize(user_id, &file.bucket_id, action)?;
        Ok((file, bucket))
    }
}

/// Keeps a specific client-supplied type, otherwise guesses from the extension.
fn content_type_for(name: &str, provided: Option<&str>) -> String {
    if let Some(ct) = provided.map(str::trim) {
        if !ct.is_empty() && ct != OCTET_STREAM {
            return ct.to_string();
        }
    }

    let guessed = match extension(name).as_deref() {
        Some("txt" | "csv" | "py" | "c" | "h" | "cpp" | "java" | "sql") => {
            "text/plain; charset=utf-8"
        }
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => OCTET_STREAM,
    };
    guessed.to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::io::AsyncReadExt;

    use super::content_type_for;
    use crate::blob::BlobStore;
    use crate::config::Limits;
    use crate::error::Error;
    use crate::service::tests::Fixture;
    use crate::store::Store;
    use crate::types::PermissionLevel;

    async fn read_download(fx: &Fixture, user_id: &str, file_id: &str) -> Vec<u8> {
        let mut download = fx.service.download_file(user_id, file_id).await.unwrap();
        let mut content = Vec::new();
        download.reader.read_to_end(&mut content).await.unwrap();
        content
    }

    #[tokio::test]
    async fn test_upload_and_download() {
        let fx = Fixture::new();
        let a = fx.user("a@example.com");
        let bucket = fx.service.create_bucket(&a.id, "docs").unwrap();

        let file = fx
            .service
            .upload_file(&a.id, &bucket.id, "notes.txt", None, b"hello")
            .await
            .unwrap();
        assert_eq!(file.size_bytes, 5);
        assert_eq!(file.content_type, "text/plain; charset=utf-8");
        assert_eq!(file.uploaded_by, a.id);

        assert_eq!(read_download(&fx, &a.id, &file.id).await, b"hello");
        assert_eq!(fx.service.list_files(&a.id, &bucket.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_upload_keeps_original() {
        let fx = Fixture::new();
        let a = fx.user("a@example.com");
        let bucket = fx.service.create_bucket(&a.id, "docs").unwrap();

        let original = fx
            .service
            .upload_file(&a.id, &bucket.id, "doc.txt", None, b"first")
            .await
            .unwrap();
        let result = fx
            .service
            .upload_file(&a.id, &bucket.id, "doc.txt", None, b"second")
            .await;
        assert!(matches!(result, Err(Error::DuplicateName)));

        assert_eq!(fx.service.list_files(&a.id, &bucket.id).unwrap().len(), 1);
        assert_eq!(read_download(&fx, &a.id, &original.id).await, b"first");
        let blobs = std::fs::read_dir(fx.store_dir().join("blobs/objects"))
            .unwrap()
            .flat_map(|shard| std::fs::read_dir(shard.unwrap().path()).unwrap())
            .flat_map(|shard| std::fs::read_dir(shard.unwrap().path()).unwrap())
            .count();
        assert_eq!(blobs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blob_failure_writes_no_metadata() {
        let fx = Fixture::new();
        let a = fx.user("a@example.com");
        let bucket = fx.service.create_bucket(&a.id, "docs").unwrap();

        fx.blobs.fail_put.store(true, Ordering::SeqCst);
        let result = fx
            .service
            .upload_file(&a.id, &bucket.id, "doc.txt", None, b"data")
            .await;
        assert!(matches!(result, Err(Error::StorageIo(_))));
        assert!(fx.store.list_bucket_files(&bucket.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let mut limits = Limits::default();
        limits.max_file_size = 4;
        let fx = Fixture::with_limits(limits);
        let a = fx.user("a@example.com");
        let bucket = fx.service.create_bucket(&a.id, "docs").unwrap();

        assert!(matches!(
            fx.service
                .upload_file(&a.id, &bucket.id, "big.txt", None, b"12345")
                .await,
            Err(Error::PayloadTooLarge(4))
        ));
        assert!(matches!(
            fx.service
                .upload_file(&a.id, &bucket.id, "run.exe", None, b"MZ")
                .await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            fx.service
                .upload_file(&a.id, &bucket.id, "../x.txt", None, b"x")
                .await,
            Err(Error::InvalidInput(_))
        ));
        fx.service
            .upload_file(&a.id, &bucket.id, "ok.txt", None, b"1234")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_view_grantee_capabilities() {
        let fx = Fixture::new();
        let a = fx.user("a@example.com");
        let b = fx.user("b@example.com");
        let bucket = fx.service.create_bucket(&a.id, "photos").unwrap();
        let file = fx
            .service
            .upload_file(&a.id, &bucket.id, "img.png", None, b"png")
            .await
            .unwrap();
        fx.service
            .share_bucket(&a.id, &bucket.id, "b@example.com", PermissionLevel::View)
            .unwrap();

        assert_eq!(fx.service.list_files(&b.id, &bucket.id).unwrap().len(), 1);
        assert_eq!(read_download(&fx, &b.id, &file.id).await, b"png");
        assert!(matches!(
            fx.service
                .upload_file(&b.id, &bucket.id, "new.png", None, b"x")
                .await,
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            fx.service.delete_file(&b.id, &file.id).await,
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            fx.service.rename_file(&b.id, &file.id, "other.png"),
            Err(Error::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_upload_grantee_capabilities() {
        let fx = Fixture::new();
        let a = fx.user("a@example.com");
        let b = fx.user("b@example.com");
        let bucket = fx.service.create_bucket(&a.id, "photos").unwrap();
        fx.service
            .share_bucket(&a.id, &bucket.id, "b@example.com", PermissionLevel::Upload)
            .unwrap();

        let file = fx
            .service
            .upload_file(&b.id, &bucket.id, "new.png", None, b"x")
            .await
            .unwrap();
        assert_eq!(file.uploaded_by, b.id);
        assert!(matches!(
            fx.service.delete_file(&b.id, &file.id).await,
            Err(Error::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_full_grantee_manages_files() {
        let fx = Fixture::new();
        let a = fx.user("a@example.com");
        let b = fx.user("b@example.com");
        let bucket = fx.service.create_bucket(&a.id, "photos").unwrap();
        let file = fx
            .service
            .upload_file(&a.id, &bucket.id, "img.png", None, b"png")
            .await
            .unwrap();
        fx.service
            .share_bucket(&a.id, &bucket.id, "b@example.com", PermissionLevel::Full)
            .unwrap();

        let renamed = fx.service.rename_file(&b.id, &file.id, "photo.png").unwrap();
        assert_eq!(renamed.name, "photo.png");

        fx.service.delete_file(&b.id, &file.id).await.unwrap();
        assert!(fx.store.get_file(&file.id).unwrap().is_none());
        assert!(!fx.blobs.exists(&file.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_stranger_sees_not_found() {
        let fx = Fixture::new();
        let a = fx.user("a@example.com");
        let c = fx.user("c@example.com");
        let bucket = fx.service.create_bucket(&a.id, "photos").unwrap();
        let file = fx
            .service
            .upload_file(&a.id, &bucket.id, "img.png", None, b"png")
            .await
            .unwrap();

        assert!(matches!(
            fx.service.download_file(&c.id, &file.id).await,
            Err(Error::NotFound)
        ));
        assert!(matches!(
            fx.service.list_files(&c.id, &bucket.id),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            fx.service.download_file(&a.id, "no-such-file").await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let fx = Fixture::new();
        let a = fx.user("a@example.com");
        let bucket = fx.service.create_bucket(&a.id, "docs").unwrap();
        let file = fx
            .service
            .upload_file(&a.id, &bucket.id, "doc.txt", None, b"x")
            .await
            .unwrap();
        fx.blobs.delete(&file.id).await.unwrap();

        assert!(matches!(
            fx.service.download_file(&a.id, &file.id).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_rename_file_collision() {
        let fx = Fixture::new();
        let a = fx.user("a@example.com");
        let bucket = fx.service.create_bucket(&a.id, "docs").unwrap();
        let first = fx
            .service
            .upload_file(&a.id, &bucket.id, "a.txt", None, b"a")
            .await
            .unwrap();
        fx.service
            .upload_file(&a.id, &bucket.id, "b.txt", None, b"b")
            .await
            .unwrap();

        assert!(matches!(
            fx.service.rename_file(&a.id, &first.id, "b.txt"),
            Err(Error::DuplicateName)
        ));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.png", None), "image/png");
        assert_eq!(
            content_type_for("a.png", Some("application/octet-stream")),
            "image/png"
        );
        assert_eq!(content_type_for("a.bin", Some("image/x-raw")), "image/x-raw");
        assert_eq!(content_type_for("README", None), "application/octet-stream");
    }
}
